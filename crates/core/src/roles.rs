//! Well-known role name constants carried in access-token claims.
//!
//! Staff roles drive the employee register; `kiosk` is the customer-facing
//! terminal. Tokens are issued out-of-band by the venue's identity service.

use crate::rental::Actor;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_EMPLOYEE: &str = "employee";
pub const ROLE_KIOSK: &str = "kiosk";

/// Returns `true` for roles allowed to operate an employee register.
pub fn is_staff(role: &str) -> bool {
    role == ROLE_EMPLOYEE || role == ROLE_ADMIN
}

/// Returns `true` if a token with `role` may act as `actor` in the
/// selection handshake and other two-party commands.
pub fn can_act_as(role: &str, actor: Actor) -> bool {
    match actor {
        Actor::Employee => is_staff(role),
        Actor::Customer => role == ROLE_KIOSK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_roles() {
        assert!(is_staff("employee"));
        assert!(is_staff("admin"));
        assert!(!is_staff("kiosk"));
        assert!(!is_staff(""));
    }

    #[test]
    fn actor_role_coherence() {
        assert!(can_act_as(ROLE_EMPLOYEE, Actor::Employee));
        assert!(can_act_as(ROLE_ADMIN, Actor::Employee));
        assert!(can_act_as(ROLE_KIOSK, Actor::Customer));
        assert!(!can_act_as(ROLE_KIOSK, Actor::Employee));
        assert!(!can_act_as(ROLE_EMPLOYEE, Actor::Customer));
    }
}
