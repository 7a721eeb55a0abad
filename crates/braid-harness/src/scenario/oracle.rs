//! Reusable oracle functions.

use braid_core::{AuthState, ConnectionState};

use crate::scenario::World;

/// Verification function run against the final [`World`].
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;

/// Combines oracles; all must pass.
#[must_use]
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world| {
        for oracle in &oracles {
            oracle(world)?;
        }
        Ok(())
    })
}

/// The connection must have reached the given state.
#[must_use]
pub fn connection_state_is(expected: ConnectionState) -> OracleFn {
    Box::new(move |world| {
        let actual = world.client.connection_state();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected connection state {expected:?}, got {actual:?}"))
        }
    })
}

/// The auth machine must have reached the given state.
#[must_use]
pub fn auth_state_is(expected: AuthState) -> OracleFn {
    Box::new(move |world| {
        let actual = world.client.auth_state();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected auth state {expected:?}, got {actual:?}"))
        }
    })
}

/// The connect completion must have resolved successfully.
#[must_use]
pub fn connect_resolved() -> OracleFn {
    Box::new(|world| match world.connect_result.try_result() {
        Some(Ok(())) => Ok(()),
        Some(Err(e)) => Err(format!("connect rejected: {e}")),
        None => Err("connect completion still pending".to_string()),
    })
}

/// Exactly these type tags must have been sent, in order.
#[must_use]
pub fn sent_kinds(expected: &[&str]) -> OracleFn {
    let expected: Vec<String> = expected.iter().map(|s| (*s).to_string()).collect();
    Box::new(move |world| {
        let actual = world.sent_kinds();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected sent kinds {expected:?}, got {actual:?}"))
        }
    })
}
