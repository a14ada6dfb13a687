//! Version policy - decides how an offered resource meets what is installed

use crate::resource::{InstallableResource, compare_versions};
use crate::types::{InstalledResource, PolicyDecision, ResourceKind};
use std::cmp::Ordering;

/// Decide whether `offered` should be installed, upgraded or ignored
///
/// - nothing installed: [`PolicyDecision::Install`]
/// - configuration: upgrade unless the digest is unchanged
/// - bundle: upgrade only to a strictly greater version; an equal or older
///   offer is ignored, leaving the installed bundle and its running state as is
pub fn decide(current: Option<&InstalledResource>, offered: &InstallableResource) -> PolicyDecision {
    let Some(current) = current else {
        return PolicyDecision::Install;
    };

    match offered.kind() {
        ResourceKind::Configuration => {
            if current.digest.as_ref() == Some(offered.digest()) {
                PolicyDecision::Ignore
            } else {
                PolicyDecision::Upgrade
            }
        }
        ResourceKind::Bundle => {
            match compare_versions(
                ResourceKind::Bundle,
                offered.version(),
                current.version.as_ref(),
            ) {
                Ordering::Greater => PolicyDecision::Upgrade,
                Ordering::Equal | Ordering::Less => PolicyDecision::Ignore,
            }
        }
    }
}
