//! Workspace Port Derivation
//!
//! The discovery port is derived deterministically from the workspace path so
//! that a render surface can find its host without any out-of-band exchange.
//! Session ports are allocated randomly in a disjoint range during the
//! discovery handoff.

use rand::Rng;

/// Discovery ports live in `[DISCOVERY_BASE, DISCOVERY_BASE + DISCOVERY_SPAN)`.
pub const DISCOVERY_BASE: u16 = 30_000;
/// Number of discovery ports.
pub const DISCOVERY_SPAN: u32 = 10_000;
/// Session ports live in `[SESSION_BASE, SESSION_END)`.
pub const SESSION_BASE: u16 = 40_000;
/// Exclusive upper bound for session ports.
pub const SESSION_END: u16 = 50_000;

/// 32-bit string hash with signed wraparound during the multiply-add,
/// coerced unsigned at the end.
///
/// Both sides of the protocol must agree on this exact function; changing it
/// silently breaks discovery.
#[must_use]
pub fn hash32(s: &str) -> u32 {
    let mut hash: i32 = 0;
    for b in s.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(i32::from(b));
    }
    hash as u32
}

/// Derive the discovery port for a workspace path.
#[must_use]
pub fn workspace_port(workspace: &str) -> u16 {
    DISCOVERY_BASE + (hash32(workspace) % DISCOVERY_SPAN) as u16
}

/// Pick a random session port for the post-discovery handoff.
pub fn random_session_port<R: Rng>(rng: &mut R) -> u16 {
    rng.gen_range(SESSION_BASE..SESSION_END)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_hash32_deterministic() {
        let a = hash32("/home/user/proj");
        let b = hash32("/home/user/proj");
        assert_eq!(a, b);
        assert_ne!(hash32("/home/user/proj"), hash32("/home/user/proj2"));
    }

    #[test]
    fn test_hash32_empty() {
        assert_eq!(hash32(""), 0);
        assert_eq!(workspace_port(""), DISCOVERY_BASE);
    }

    #[test]
    fn test_workspace_port_range() {
        for path in ["/a/b/c", "/home/user/proj", "noworkspace", "日本語パス"] {
            let port = workspace_port(path);
            assert!((DISCOVERY_BASE..DISCOVERY_BASE + DISCOVERY_SPAN as u16).contains(&port));
        }
    }

    #[test]
    fn test_workspace_port_repeatable() {
        let first = workspace_port("/a/b/c");
        for _ in 0..10 {
            assert_eq!(workspace_port("/a/b/c"), first);
        }
    }

    #[test]
    fn test_session_port_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let port = random_session_port(&mut rng);
            assert!((SESSION_BASE..SESSION_END).contains(&port));
        }
    }
}
