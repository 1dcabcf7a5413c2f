use camino::Utf8Path;
use tracing::debug;
use transplan_types::file::FileId;
use transplan_types::flags::CompileFlagSet;

/// Result of one propagation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagPropagation {
    pub flags: CompileFlagSet,
    /// Replacements that received a copy of their original's entry.
    pub propagated: Vec<FileId>,
}

/// Give each replacement an exact copy of its original's compiler flags.
///
/// Lookups read `flags` as passed in, so a pass never observes its own
/// writes. A replacement whose original has no entry ends up with no entry
/// either, which keeps both compiling under the same conditions.
pub fn propagate_flags<'a, I>(
    flags: &CompileFlagSet,
    pairs: I,
    base: Option<&Utf8Path>,
) -> FlagPropagation
where
    I: IntoIterator<Item = (&'a FileId, &'a FileId)>,
{
    let mut out = flags.clone();
    let mut propagated = Vec::new();

    for (original, replacement) in pairs {
        match flags.find(original, base) {
            Some(entry) => {
                out.insert(replacement.clone(), entry.clone());
                propagated.push(replacement.clone());
            }
            None => {
                out.remove(replacement);
                debug!(original = %original, "no compiler flags to propagate");
            }
        }
    }

    FlagPropagation {
        flags: out,
        propagated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use transplan_types::flags::CompileFlags;

    fn flags(defs: &[&str]) -> CompileFlags {
        CompileFlags {
            definitions: defs.iter().map(|s| s.to_string()).collect(),
            include_dirs: vec!["include".to_string()],
            options: vec!["-O2".to_string(), "-O2".to_string()],
        }
    }

    #[test]
    fn copies_entry_verbatim() {
        let mut set = CompileFlagSet::new();
        set.insert(FileId::from("a.f"), flags(&["A", "B=1"]));
        let original = FileId::from("a.f");
        let replacement = FileId::from("a.gen.f");

        let result = propagate_flags(&set, [(&original, &replacement)], None);

        assert_eq!(result.flags.get(&replacement), Some(&flags(&["A", "B=1"])));
        assert_eq!(result.flags.get(&original), Some(&flags(&["A", "B=1"])));
        assert_eq!(result.propagated, vec![replacement]);
    }

    #[test]
    fn replacement_loses_stale_entry_when_original_has_none() {
        let mut set = CompileFlagSet::new();
        set.insert(FileId::from("a.gen.f"), flags(&["STALE"]));
        let original = FileId::from("a.f");
        let replacement = FileId::from("a.gen.f");

        let result = propagate_flags(&set, [(&original, &replacement)], None);

        assert!(result.flags.get(&replacement).is_none());
        assert!(result.propagated.is_empty());
    }

    #[test]
    fn original_found_through_base() {
        let mut set = CompileFlagSet::new();
        set.insert(FileId::from("src/a.f"), flags(&["X"]));
        let original = FileId::from("/proj/src/a.f");
        let replacement = FileId::from("/proj/build/a.gen.f");

        let result = propagate_flags(
            &set,
            [(&original, &replacement)],
            Some(Utf8Path::new("/proj")),
        );

        assert_eq!(result.flags.get(&replacement), Some(&flags(&["X"])));
    }
}
