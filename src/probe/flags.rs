//! Compiler and linker flag parsing for probe output

use std::path::PathBuf;

/// Flags sorted into the construction lists they belong to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFlags {
    pub cpppath: Vec<PathBuf>,
    pub cppdefines: Vec<String>,
    pub ccflags: Vec<String>,
    pub linkflags: Vec<String>,
    pub libpath: Vec<PathBuf>,
    pub libs: Vec<String>,
    pub rpath: Vec<PathBuf>,
}

impl ParsedFlags {
    /// Split `text` on whitespace and classify each option.
    ///
    /// `-I`, `-L`, `-l` and `-D` accept their value attached or as the next
    /// word. Bare words are taken as libraries.
    pub fn parse(text: &str) -> Self {
        let mut flags = Self::default();
        let mut words = text.split_whitespace();

        while let Some(word) = words.next() {
            if let Some(rest) = word.strip_prefix("-Wl,-rpath,") {
                flags.rpath.push(PathBuf::from(rest));
            } else if let Some(rest) = word.strip_prefix("-Wl,-rpath=") {
                flags.rpath.push(PathBuf::from(rest));
            } else if let Some(rest) = word.strip_prefix("-Wl,-R") {
                flags.rpath.push(PathBuf::from(rest));
            } else if word.starts_with("-Wl,") {
                flags.linkflags.push(word.to_string());
            } else if word == "-pthread" {
                flags.ccflags.push(word.to_string());
                flags.linkflags.push(word.to_string());
            } else if matches!(word, "-isystem" | "-include" | "-framework") {
                let value = words.next().unwrap_or_default();
                let target = if word == "-framework" {
                    &mut flags.linkflags
                } else {
                    &mut flags.ccflags
                };
                target.push(word.to_string());
                if !value.is_empty() {
                    target.push(value.to_string());
                }
            } else if let Some(value) = attached_or_next(word, "-I", &mut words) {
                flags.cpppath.push(PathBuf::from(value));
            } else if let Some(value) = attached_or_next(word, "-L", &mut words) {
                flags.libpath.push(PathBuf::from(value));
            } else if let Some(value) = attached_or_next(word, "-l", &mut words) {
                flags.libs.push(value);
            } else if let Some(value) = attached_or_next(word, "-D", &mut words) {
                flags.cppdefines.push(value);
            } else if let Some(rest) = word.strip_prefix("-R") {
                flags.rpath.push(PathBuf::from(rest));
            } else if word.starts_with('-') {
                flags.ccflags.push(word.to_string());
            } else {
                flags.libs.push(word.to_string());
            }
        }

        flags
    }
}

fn attached_or_next<'a>(
    word: &str,
    option: &str,
    words: &mut impl Iterator<Item = &'a str>,
) -> Option<String> {
    let rest = word.strip_prefix(option)?;
    if rest.is_empty() {
        Some(words.next().unwrap_or_default().to_string())
    } else {
        Some(rest.to_string())
    }
}

/// Drop the system default `-L/usr/lib` and `-L/usr/lib64` search paths
pub fn filter_ldflags(flags: &str) -> String {
    flags
        .split_whitespace()
        .filter(|f| !matches!(*f, "-L/usr/lib" | "-L/usr/lib64"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkg_config_style_output() {
        let flags = ParsedFlags::parse(
            "-I/usr/include/libxml2 -DXML_STATIC -pthread -L/opt/xml/lib -lxml2 -lz -lm",
        );

        assert_eq!(flags.cpppath, vec![PathBuf::from("/usr/include/libxml2")]);
        assert_eq!(flags.cppdefines, vec!["XML_STATIC"]);
        assert_eq!(flags.libpath, vec![PathBuf::from("/opt/xml/lib")]);
        assert_eq!(flags.libs, vec!["xml2", "z", "m"]);
        assert_eq!(flags.ccflags, vec!["-pthread"]);
        assert_eq!(flags.linkflags, vec!["-pthread"]);
    }

    #[test]
    fn detached_values() {
        let flags = ParsedFlags::parse("-I /inc -L /lib -l foo -D BAR");
        assert_eq!(flags.cpppath, vec![PathBuf::from("/inc")]);
        assert_eq!(flags.libpath, vec![PathBuf::from("/lib")]);
        assert_eq!(flags.libs, vec!["foo"]);
        assert_eq!(flags.cppdefines, vec!["BAR"]);
    }

    #[test]
    fn rpath_forms() {
        let flags = ParsedFlags::parse("-Wl,-rpath,/a -Wl,-rpath=/b -R/c -Wl,--as-needed");
        assert_eq!(
            flags.rpath,
            vec![PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/c")]
        );
        assert_eq!(flags.linkflags, vec!["-Wl,--as-needed"]);
    }

    #[test]
    fn paired_options_keep_their_argument() {
        let flags = ParsedFlags::parse("-isystem /sys/inc -framework CoreFoundation -O2");
        assert_eq!(flags.ccflags, vec!["-isystem", "/sys/inc", "-O2"]);
        assert_eq!(flags.linkflags, vec!["-framework", "CoreFoundation"]);
    }

    #[test]
    fn filter_removes_only_default_lib_dirs() {
        assert_eq!(
            filter_ldflags("-L/usr/lib -L/usr/lib64 -L/usr/lib/x -L/opt/lib -lfoo"),
            "-L/usr/lib/x -L/opt/lib -lfoo"
        );
    }
}
