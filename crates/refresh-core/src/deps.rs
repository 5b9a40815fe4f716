use std::collections::BTreeSet;

use crate::descriptor::VersionDescriptor;

/// Names of remote dependencies the local descriptor does not declare with
/// the exact same constraint string. Local-only dependencies are ignored.
#[must_use]
pub fn diff_dependencies(
    local: &VersionDescriptor,
    remote: &VersionDescriptor,
) -> BTreeSet<String> {
    remote
        .dependencies
        .iter()
        .filter(|(name, constraint)| local.dependencies.get(*name) != Some(*constraint))
        .map(|(name, _)| name.clone())
        .collect()
}
