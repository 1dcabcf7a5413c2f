use crate::error::DomainError;
use crate::matcher::{RemovalMatch, RemovalMatcher};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use transplan_types::file::{FileId, SourceSet};
use transplan_types::plan::TransformPlan;
use transplan_types::target::PlacementMode;

/// What to do when a copy destination is already taken, by another retained
/// source or by a plan output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Abort reconciliation, naming both sources.
    #[default]
    Fail,
    /// The source listed later wins; the destination appears once. A plan
    /// output always wins over a copy.
    Overwrite,
    /// Keep each source's path below the source root inside the output
    /// directory instead of flattening to the file name.
    PreserveSubpath,
}

impl CollisionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            CollisionPolicy::Fail => "fail",
            CollisionPolicy::Overwrite => "overwrite",
            CollisionPolicy::PreserveSubpath => "preserve_subpath",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub mode: PlacementMode,
    /// Destination of copied sources.
    pub output_dir: Utf8PathBuf,
    /// Base that relative ids are resolved against.
    pub source_root: Option<Utf8PathBuf>,
    pub removal_match: RemovalMatch,
    pub collision: CollisionPolicy,
}

impl ReconcileOptions {
    pub fn new(mode: PlacementMode, output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            mode,
            output_dir: output_dir.into(),
            source_root: None,
            removal_match: RemovalMatch::default(),
            collision: CollisionPolicy::default(),
        }
    }
}

/// A retained source duplicated into the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyAction {
    pub from: FileId,
    pub to: FileId,
}

/// Outcome of merging a plan into a source set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// The new source set: retained (or copied) sources, then appended files.
    pub sources: SourceSet,
    /// Sources selected by a removal pattern.
    pub removed: Vec<FileId>,
    /// Sources superseded by their transformed replacement.
    pub dropped_originals: Vec<FileId>,
    pub copies: Vec<CopyAction>,
    /// Plan outputs newly added to the source set.
    pub appended: Vec<FileId>,
    /// Files the build must produce: copies and every plan output.
    pub generated: BTreeSet<FileId>,
    /// False when the plan has nothing to regenerate.
    pub transform_required: bool,
}

impl Reconciliation {
    /// (original, copy) pairs for flag propagation.
    pub fn copy_pairs(&self) -> impl Iterator<Item = (&FileId, &FileId)> {
        self.copies.iter().map(|c| (&c.from, &c.to))
    }
}

/// Merge `plan` into `current`.
///
/// Order of the retained sources is kept; plan outputs follow in plan order.
/// No duplicate id is introduced.
pub fn reconcile(
    current: &SourceSet,
    plan: &TransformPlan,
    opts: &ReconcileOptions,
) -> Result<Reconciliation, DomainError> {
    let base = opts.source_root.as_deref();
    let matcher = RemovalMatcher::new(plan.remove(), opts.removal_match, base)?;
    let transformed: BTreeSet<FileId> = plan.transform().iter().map(|t| t.resolve(base)).collect();

    let mut out = Reconciliation::default();
    let mut retained = Vec::new();

    for source in current {
        if matcher.matches(source) {
            debug!(source = %source, "removed by plan pattern");
            out.removed.push(source.clone());
        } else if transformed.contains(&source.resolve(base)) {
            debug!(source = %source, "superseded by transformed output");
            out.dropped_originals.push(source.clone());
        } else {
            retained.push(source.clone());
        }
    }

    let mut sources = match opts.mode {
        PlacementMode::InPlace => SourceSet::from(retained),
        PlacementMode::CopyUnmodified => {
            let (placed, copies) = place_copies(retained, opts)?;
            let (placed, copies) = yield_to_plan_outputs(placed, copies, plan, opts)?;
            out.generated.extend(copies.iter().map(|c| c.to.clone()));
            out.copies = copies;
            placed
        }
    };

    out.transform_required = !plan.append().is_empty();
    if out.transform_required {
        for appended in plan.append() {
            if sources.push_unique(appended.clone()) {
                out.appended.push(appended.clone());
            }
            out.generated.insert(appended.clone());
        }
    } else {
        debug!("plan has no outputs; transform phase not needed");
    }

    out.sources = sources;
    Ok(out)
}

struct Slot {
    index: usize,
    origin: FileId,
    copy: Option<usize>,
}

fn place_copies(
    retained: Vec<FileId>,
    opts: &ReconcileOptions,
) -> Result<(SourceSet, Vec<CopyAction>), DomainError> {
    let base = opts.source_root.as_deref();
    let mut placed: Vec<FileId> = Vec::new();
    let mut copies: Vec<CopyAction> = Vec::new();
    let mut slots: BTreeMap<FileId, Slot> = BTreeMap::new();

    for source in retained {
        let destination = copy_destination(&source, opts)?;
        let resolved = source.resolve(base);
        let already_there = destination == resolved;

        match slots.get_mut(&destination) {
            None => {
                let copy = if already_there {
                    placed.push(source.clone());
                    None
                } else {
                    placed.push(destination.clone());
                    copies.push(CopyAction {
                        from: source.clone(),
                        to: destination.clone(),
                    });
                    Some(copies.len() - 1)
                };
                slots.insert(
                    destination,
                    Slot {
                        index: placed.len() - 1,
                        origin: source,
                        copy,
                    },
                );
            }
            Some(slot) if slot.origin.resolve(base) == resolved => {
                debug!(source = %source, "duplicate source entry");
            }
            Some(slot) => match opts.collision {
                CollisionPolicy::Overwrite => {
                    warn!(
                        destination = %destination,
                        first = %slot.origin,
                        second = %source,
                        "copy destination collision; later source wins"
                    );
                    match slot.copy {
                        Some(i) => copies[i].from = source.clone(),
                        None => {
                            copies.push(CopyAction {
                                from: source.clone(),
                                to: destination.clone(),
                            });
                            slot.copy = Some(copies.len() - 1);
                            placed[slot.index] = destination.clone();
                        }
                    }
                    slot.origin = source;
                }
                CollisionPolicy::Fail | CollisionPolicy::PreserveSubpath => {
                    return Err(DomainError::CopyCollision {
                        destination,
                        first: slot.origin.clone(),
                        second: source,
                    });
                }
            },
        }
    }

    Ok((SourceSet::from(placed), copies))
}

/// A copy must not land on a file the transform phase writes. Under
/// `Overwrite` the transformed output wins and the copy is dropped.
fn yield_to_plan_outputs(
    placed: SourceSet,
    copies: Vec<CopyAction>,
    plan: &TransformPlan,
    opts: &ReconcileOptions,
) -> Result<(SourceSet, Vec<CopyAction>), DomainError> {
    let base = opts.source_root.as_deref();
    let outputs: BTreeMap<FileId, &FileId> = plan
        .pairs()
        .map(|(original, replacement)| (replacement.resolve(base), original))
        .collect();
    if outputs.is_empty() {
        return Ok((placed, copies));
    }

    let mut kept = Vec::with_capacity(copies.len());
    let mut shadowed = BTreeSet::new();
    for copy in copies {
        let Some(original) = outputs.get(&copy.to) else {
            kept.push(copy);
            continue;
        };
        match opts.collision {
            CollisionPolicy::Overwrite => {
                warn!(
                    destination = %copy.to,
                    copied = %copy.from,
                    transformed = %original,
                    "copy destination is a transform output; transformed file wins"
                );
                shadowed.insert(copy.to);
            }
            CollisionPolicy::Fail | CollisionPolicy::PreserveSubpath => {
                return Err(DomainError::CopyCollision {
                    destination: copy.to,
                    first: copy.from,
                    second: (*original).clone(),
                });
            }
        }
    }

    let placed = placed
        .into_iter()
        .filter(|id| !shadowed.contains(id))
        .collect();
    Ok((placed, kept))
}

fn copy_destination(source: &FileId, opts: &ReconcileOptions) -> Result<FileId, DomainError> {
    let base = opts.source_root.as_deref();
    let relative = match opts.collision {
        CollisionPolicy::PreserveSubpath => source.relative_to(base),
        CollisionPolicy::Fail | CollisionPolicy::Overwrite => match source.file_name() {
            Some(name) => Utf8PathBuf::from(name),
            None => return Err(DomainError::InvalidSource { id: source.clone() }),
        },
    };
    if relative.as_str().is_empty() {
        return Err(DomainError::InvalidSource { id: source.clone() });
    }
    Ok(FileId::new(opts.output_dir.join(&relative)).resolve(base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(items: &[&str]) -> SourceSet {
        items.iter().map(|s| FileId::from(*s)).collect()
    }

    fn ids(items: &[&str]) -> Vec<FileId> {
        items.iter().map(|s| FileId::from(*s)).collect()
    }

    fn plan(transform: &[&str], append: &[&str], remove: &[&str]) -> TransformPlan {
        TransformPlan::new(
            ids(transform),
            ids(append),
            remove.iter().map(|s| s.to_string()).collect(),
        )
        .expect("plan")
    }

    fn strs(set: &SourceSet) -> Vec<&str> {
        set.iter().map(FileId::as_str).collect()
    }

    #[test]
    fn in_place_example() {
        let current = set(&["a.f", "b.f", "c.f"]);
        let plan = plan(&["a.f"], &["a.gen.f"], &["b\\.f"]);
        let opts = ReconcileOptions::new(PlacementMode::InPlace, "/build");

        let result = reconcile(&current, &plan, &opts).expect("reconcile");

        assert_eq!(strs(&result.sources), vec!["c.f", "a.gen.f"]);
        assert_eq!(result.removed, ids(&["b.f"]));
        assert_eq!(result.dropped_originals, ids(&["a.f"]));
        assert_eq!(result.appended, ids(&["a.gen.f"]));
        assert!(result.copies.is_empty());
        assert!(result.transform_required);
        assert!(result.generated.contains(&FileId::from("a.gen.f")));
    }

    #[test]
    fn empty_append_skips_transform() {
        let current = set(&["a.f", "b.f"]);
        let plan = plan(&[], &[], &["b\\.f"]);
        let opts = ReconcileOptions::new(PlacementMode::InPlace, "/build");

        let result = reconcile(&current, &plan, &opts).expect("reconcile");

        assert!(!result.transform_required);
        assert!(result.generated.is_empty());
        assert_eq!(strs(&result.sources), vec!["a.f"]);
    }

    #[test]
    fn empty_plan_is_idempotent() {
        let current = set(&["c.f", "a.gen.f"]);
        let opts = ReconcileOptions::new(PlacementMode::InPlace, "/build");

        let result = reconcile(&current, &TransformPlan::empty(), &opts).expect("reconcile");

        assert_eq!(result.sources, current);
        assert!(result.removed.is_empty());
        assert!(!result.transform_required);
    }

    #[test]
    fn copy_unmodified_redirects_to_copies() {
        let current = set(&["/src/x/a.f", "/src/y/b.f", "/src/z/c.f"]);
        let plan = plan(&["/src/x/a.f"], &["/build/a.gen.f"], &[]);
        let opts = ReconcileOptions::new(PlacementMode::CopyUnmodified, "/build");

        let result = reconcile(&current, &plan, &opts).expect("reconcile");

        assert_eq!(
            strs(&result.sources),
            vec!["/build/b.f", "/build/c.f", "/build/a.gen.f"]
        );
        assert_eq!(
            result.copies,
            vec![
                CopyAction {
                    from: FileId::from("/src/y/b.f"),
                    to: FileId::from("/build/b.f"),
                },
                CopyAction {
                    from: FileId::from("/src/z/c.f"),
                    to: FileId::from("/build/c.f"),
                },
            ]
        );
        assert!(result.generated.contains(&FileId::from("/build/b.f")));
        assert!(result.generated.contains(&FileId::from("/build/a.gen.f")));
    }

    #[test]
    fn copy_collision_fails_by_default() {
        let current = set(&["/src/x/foo.f", "/src/y/foo.f"]);
        let opts = ReconcileOptions::new(PlacementMode::CopyUnmodified, "/build");

        let err = reconcile(&current, &TransformPlan::empty(), &opts).expect_err("collision");

        assert_eq!(
            err,
            DomainError::CopyCollision {
                destination: FileId::from("/build/foo.f"),
                first: FileId::from("/src/x/foo.f"),
                second: FileId::from("/src/y/foo.f"),
            }
        );
    }

    #[test]
    fn copy_collision_overwrite_keeps_later_source() {
        let current = set(&["/src/x/foo.f", "/src/bar.f", "/src/y/foo.f"]);
        let mut opts = ReconcileOptions::new(PlacementMode::CopyUnmodified, "/build");
        opts.collision = CollisionPolicy::Overwrite;

        let result = reconcile(&current, &TransformPlan::empty(), &opts).expect("reconcile");

        assert_eq!(strs(&result.sources), vec!["/build/foo.f", "/build/bar.f"]);
        assert_eq!(
            result.copies[0],
            CopyAction {
                from: FileId::from("/src/y/foo.f"),
                to: FileId::from("/build/foo.f"),
            }
        );
        assert_eq!(result.copies.len(), 2);
    }

    #[test]
    fn copy_onto_transform_output_fails_by_default() {
        let current = set(&["/src/x/b.f", "/src/y/b.f"]);
        let plan = plan(&["/src/y/b.f"], &["/build/b.f"], &[]);
        let opts = ReconcileOptions::new(PlacementMode::CopyUnmodified, "/build");

        let err = reconcile(&current, &plan, &opts).expect_err("collision");

        assert_eq!(
            err,
            DomainError::CopyCollision {
                destination: FileId::from("/build/b.f"),
                first: FileId::from("/src/x/b.f"),
                second: FileId::from("/src/y/b.f"),
            }
        );
    }

    #[test]
    fn copy_onto_transform_output_yields_under_overwrite() {
        let current = set(&["/src/x/b.f", "/src/y/b.f", "/src/c.f"]);
        let plan = plan(&["/src/y/b.f"], &["/build/b.f"], &[]);
        let mut opts = ReconcileOptions::new(PlacementMode::CopyUnmodified, "/build");
        opts.collision = CollisionPolicy::Overwrite;

        let result = reconcile(&current, &plan, &opts).expect("reconcile");

        assert_eq!(strs(&result.sources), vec!["/build/c.f", "/build/b.f"]);
        assert_eq!(
            result.copies,
            vec![CopyAction {
                from: FileId::from("/src/c.f"),
                to: FileId::from("/build/c.f"),
            }]
        );
        assert_eq!(result.appended, ids(&["/build/b.f"]));
    }

    #[test]
    fn preserve_subpath_avoids_collisions() {
        let current = set(&["x/foo.f", "y/foo.f"]);
        let mut opts = ReconcileOptions::new(PlacementMode::CopyUnmodified, "/build/out");
        opts.collision = CollisionPolicy::PreserveSubpath;
        opts.source_root = Some(Utf8PathBuf::from("/proj"));

        let result = reconcile(&current, &TransformPlan::empty(), &opts).expect("reconcile");

        assert_eq!(
            strs(&result.sources),
            vec!["/build/out/x/foo.f", "/build/out/y/foo.f"]
        );
    }

    #[test]
    fn sources_already_in_output_dir_are_not_copied_again() {
        let current = set(&["/build/b.f", "/build/a.gen.f"]);
        let opts = ReconcileOptions::new(PlacementMode::CopyUnmodified, "/build");

        let result = reconcile(&current, &TransformPlan::empty(), &opts).expect("reconcile");

        assert_eq!(result.sources, current);
        assert!(result.copies.is_empty());
    }

    #[test]
    fn appending_never_duplicates() {
        let current = set(&["a.gen.f", "b.f"]);
        let plan = plan(&["a.f"], &["a.gen.f"], &[]);
        let opts = ReconcileOptions::new(PlacementMode::InPlace, "/build");

        let result = reconcile(&current, &plan, &opts).expect("reconcile");

        assert_eq!(strs(&result.sources), vec!["a.gen.f", "b.f"]);
        assert!(result.appended.is_empty());
        assert!(result.generated.contains(&FileId::from("a.gen.f")));
    }

    #[test]
    fn transformed_originals_match_through_source_root() {
        let current = set(&["src/a.f", "src/b.f"]);
        let plan = plan(&["/proj/src/a.f"], &["/proj/build/a.gen.f"], &[]);
        let mut opts = ReconcileOptions::new(PlacementMode::InPlace, "/proj/build");
        opts.source_root = Some(Utf8PathBuf::from("/proj"));

        let result = reconcile(&current, &plan, &opts).expect("reconcile");

        assert_eq!(strs(&result.sources), vec!["src/b.f", "/proj/build/a.gen.f"]);
    }

    #[test]
    fn exact_removal_spares_similar_names() {
        let current = set(&["src/b.f", "src/bb.f"]);
        let plan = plan(&[], &[], &["src/b.f"]);
        let mut opts = ReconcileOptions::new(PlacementMode::InPlace, "/build");
        opts.removal_match = RemovalMatch::Exact;

        let result = reconcile(&current, &plan, &opts).expect("reconcile");

        assert_eq!(strs(&result.sources), vec!["src/bb.f"]);
    }

    #[test]
    fn invalid_pattern_aborts() {
        let current = set(&["a.f"]);
        let plan = plan(&[], &[], &["[unclosed"]);
        let opts = ReconcileOptions::new(PlacementMode::InPlace, "/build");

        let err = reconcile(&current, &plan, &opts).expect_err("invalid");
        assert!(matches!(err, DomainError::InvalidPattern { .. }));
    }
}
