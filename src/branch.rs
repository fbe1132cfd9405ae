use crate::error::{Error, Result};

pub const BRANCH_PREFIX: &str = "wl";

/// Deterministic branch for one rig's work on one item. Other components
/// parse this literal layout, so it must not change.
pub fn branch_name(rig: &str, wanted_id: &str) -> String {
    format!("{BRANCH_PREFIX}/{rig}/{wanted_id}")
}

/// Listing prefix covering every work branch owned by `rig`.
pub fn rig_prefix(rig: &str) -> String {
    format!("{BRANCH_PREFIX}/{rig}/")
}

pub fn parse_branch(name: &str) -> Result<(&str, &str)> {
    let mut parts = name.splitn(3, '/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(BRANCH_PREFIX), Some(rig), Some(id)) if !rig.is_empty() && !id.is_empty() => {
            Ok((rig, id))
        }
        _ => Err(Error::InvalidInput(format!("not a work branch: {name}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_name_uses_the_wire_layout() {
        assert_eq!(branch_name("bob", "w-00c0ffee"), "wl/bob/w-00c0ffee");
        assert_eq!(rig_prefix("bob"), "wl/bob/");
    }

    #[test]
    fn parse_branch_roundtrips() {
        let (rig, id) = parse_branch("wl/bob/w-00c0ffee").unwrap();
        assert_eq!(rig, "bob");
        assert_eq!(id, "w-00c0ffee");
    }

    #[test]
    fn parse_branch_rejects_foreign_names() {
        assert!(parse_branch("feature/login").is_err());
        assert!(parse_branch("wl/bob").is_err());
        assert!(parse_branch("wl//w-1").is_err());
        assert!(parse_branch("wl/bob/").is_err());
    }
}
