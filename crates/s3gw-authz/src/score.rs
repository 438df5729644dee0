//! Policy item priority score.
//!
//! Lower scores sort first. The score is computed for every item when a
//! snapshot is built but does not influence decisions: the first
//! resource-matching policy decides regardless of its items' scores.

use crate::model::{PolicyItem, GROUP_PUBLIC, USER_CURRENT};

/// Score of an item before any discount.
pub const DEFAULT_SCORE: i32 = 1000;

/// Largest discount for the breadth of the user/group clause.
pub const MAX_DISCOUNT_PRINCIPALS: i32 = 25;

/// Largest discount for the breadth of the access list.
pub const MAX_DISCOUNT_ACCESS_TYPES: i32 = 25;

/// Largest discount for having no conditions.
pub const MAX_DISCOUNT_CONDITIONS: i32 = 25;

/// Discount removed per declared condition.
pub const CONDITION_WEIGHT: i32 = 5;

/// Compute the priority score of `item`.
///
/// `service_access_types` is the number of access types the service defines;
/// zero skips the access-breadth discount.
pub fn item_score(item: &PolicyItem, service_access_types: usize) -> i32 {
    let mut score = DEFAULT_SCORE;

    let names_everyone = item.groups.iter().any(|g| g == GROUP_PUBLIC)
        || item.users.iter().any(|u| u == USER_CURRENT);
    if names_everyone {
        score -= MAX_DISCOUNT_PRINCIPALS;
    } else {
        let count = item.users.len() + item.groups.len();
        score -= i32::try_from(count)
            .map_or(MAX_DISCOUNT_PRINCIPALS, |c| c.min(MAX_DISCOUNT_PRINCIPALS));
    }

    if service_access_types > 0 {
        let percent = (item.accesses.len() as f32 * 100.0) / service_access_types as f32;
        score -= round_half_up(MAX_DISCOUNT_ACCESS_TYPES as f32 * percent / 100.0);
    }

    let conditions = i32::try_from(item.conditions.len()).unwrap_or(i32::MAX / CONDITION_WEIGHT);
    let condition_discount =
        MAX_DISCOUNT_CONDITIONS.saturating_sub(CONDITION_WEIGHT.saturating_mul(conditions));
    if condition_discount > 0 {
        score -= condition_discount;
    }

    score
}

/// Round to nearest with ties toward positive infinity, `floor(x + 0.5)`.
#[allow(clippy::cast_possible_truncation)]
fn round_half_up(value: f32) -> i32 {
    (value + 0.5).floor() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Condition;

    #[test]
    fn test_single_user_single_access() {
        let item = PolicyItem::new().users(["alice"]).allow("read");
        // 1000 - 1 (principals) - round(25 * 1/4) = 6 - 25 (no conditions)
        assert_eq!(item_score(&item, 4), 968);
    }

    #[test]
    fn test_public_group_takes_full_discount() {
        let item = PolicyItem::new().groups([GROUP_PUBLIC]).allow("read");
        assert_eq!(item_score(&item, 0), 1000 - 25 - 25);

        let any_user = PolicyItem::new().users([USER_CURRENT]).allow("read");
        assert_eq!(item_score(&any_user, 0), 1000 - 25 - 25);
    }

    #[test]
    fn test_principal_discount_caps() {
        let users: Vec<String> = (0..40).map(|i| format!("u{i}")).collect();
        let item = PolicyItem::new().users(users);
        assert_eq!(item_score(&item, 0), 1000 - 25 - 25);
    }

    #[test]
    fn test_access_breadth_rounds_half_up() {
        // 25 * 2/4 = 12.5 rounds to 13
        let item = PolicyItem::new().users(["a"]).allow("read").allow("write");
        assert_eq!(item_score(&item, 4), 1000 - 1 - 13 - 25);

        // All access types: full discount.
        let all = PolicyItem::new()
            .users(["a"])
            .allow("read")
            .allow("write")
            .allow("read_acp")
            .allow("write_acp");
        assert_eq!(item_score(&all, 4), 1000 - 1 - 25 - 25);
    }

    #[test]
    fn test_condition_discount_floors_at_zero() {
        let mut item = PolicyItem::new().users(["a"]);
        for _ in 0..2 {
            item = item.condition(Condition::new("ipaddress-in-range", ["10.0.0.0/8"]));
        }
        assert_eq!(item_score(&item, 0), 1000 - 1 - 15);

        for _ in 0..4 {
            item = item.condition(Condition::new("ipaddress-in-range", ["10.0.0.0/8"]));
        }
        assert_eq!(item_score(&item, 0), 1000 - 1);
    }

    #[test]
    fn test_deterministic() {
        let item = PolicyItem::new().users(["a", "b"]).groups(["g"]).allow("read");
        assert_eq!(item_score(&item, 4), item_score(&item, 4));
    }
}
