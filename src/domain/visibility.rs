use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileVisibility {
    Everyone,
    University,
    Nobody,
}

impl ProfileVisibility {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "everyone" => Some(Self::Everyone),
            "university" => Some(Self::University),
            "nobody" => Some(Self::Nobody),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Everyone => "everyone",
            Self::University => "university",
            Self::Nobody => "nobody",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementPolicy {
    Everyone,
    University,
}

impl EngagementPolicy {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "everyone" => Some(Self::Everyone),
            "university" => Some(Self::University),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Everyone => "everyone",
            Self::University => "university",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PrivacySettings {
    pub user_id: Uuid,
    pub profile_visibility: ProfileVisibility,
    pub who_can_react: EngagementPolicy,
    pub who_can_comment: EngagementPolicy,
}

impl PrivacySettings {
    /// Settings in force for a user who never touched their privacy page.
    pub fn defaults(user_id: Uuid) -> Self {
        Self {
            user_id,
            profile_visibility: ProfileVisibility::University,
            who_can_react: EngagementPolicy::Everyone,
            who_can_comment: EngagementPolicy::Everyone,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementKind {
    React,
    Comment,
}

/// Everything the visibility decision needs about one (viewer, content) pair.
///
/// Gathered in a single query by `VisibilityService`; the decision itself
/// stays pure so the rule ordering can be tested without a database.
#[derive(Debug, Clone)]
pub struct ViewFacts {
    pub viewer_id: Uuid,
    pub owner_id: Uuid,
    pub flagged: bool,
    pub blocked_either_way: bool,
    pub owner_profile_visibility: ProfileVisibility,
    pub viewer_university: String,
    pub owner_university: String,
}

/// Whether `viewer` may read the content described by `facts`.
///
/// The checks short-circuit in a fixed order; owners always see their own
/// content, and flagged content is hidden from everyone else before any
/// block or privacy rule is consulted.
pub fn is_visible(facts: &ViewFacts) -> bool {
    if facts.viewer_id == facts.owner_id {
        return true;
    }
    if facts.flagged {
        return false;
    }
    if facts.blocked_either_way {
        return false;
    }
    match facts.owner_profile_visibility {
        ProfileVisibility::Nobody => false,
        ProfileVisibility::University => facts.viewer_university == facts.owner_university,
        ProfileVisibility::Everyone => true,
    }
}

/// Whether `viewer` may react to or comment on `owner`'s content.
///
/// A block in either direction always wins; otherwise the owner's policy for
/// the given kind applies.
pub fn can_engage(
    blocked_either_way: bool,
    policy: EngagementPolicy,
    viewer_university: &str,
    owner_university: &str,
) -> bool {
    if blocked_either_way {
        return false;
    }
    match policy {
        EngagementPolicy::Everyone => true,
        EngagementPolicy::University => viewer_university == owner_university,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> ViewFacts {
        ViewFacts {
            viewer_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            flagged: false,
            blocked_either_way: false,
            owner_profile_visibility: ProfileVisibility::Everyone,
            viewer_university: "stanford.edu".into(),
            owner_university: "stanford.edu".into(),
        }
    }

    #[test]
    fn owner_always_sees_own_content() {
        let mut f = facts();
        f.viewer_id = f.owner_id;
        f.flagged = true;
        f.blocked_either_way = true;
        f.owner_profile_visibility = ProfileVisibility::Nobody;
        assert!(is_visible(&f));
    }

    #[test]
    fn flagged_content_hidden_from_non_owner() {
        let mut f = facts();
        f.flagged = true;
        assert!(!is_visible(&f));
    }

    #[test]
    fn flagged_beats_open_profile() {
        let mut f = facts();
        f.flagged = true;
        f.owner_profile_visibility = ProfileVisibility::Everyone;
        assert!(!is_visible(&f));
    }

    #[test]
    fn block_hides_even_unflagged_public_content() {
        let mut f = facts();
        f.blocked_either_way = true;
        f.owner_profile_visibility = ProfileVisibility::Everyone;
        assert!(!is_visible(&f));
    }

    #[test]
    fn nobody_profile_hides_from_everyone_but_owner() {
        let mut f = facts();
        f.owner_profile_visibility = ProfileVisibility::Nobody;
        assert!(!is_visible(&f));
    }

    #[test]
    fn university_profile_requires_matching_affiliation() {
        let mut f = facts();
        f.owner_profile_visibility = ProfileVisibility::University;
        assert!(is_visible(&f));

        f.viewer_university = "berkeley.edu".into();
        assert!(!is_visible(&f));
    }

    #[test]
    fn everyone_profile_visible_across_universities() {
        let mut f = facts();
        f.viewer_university = "berkeley.edu".into();
        assert!(is_visible(&f));
    }

    #[test]
    fn engage_blocked_either_way_denied() {
        assert!(!can_engage(
            true,
            EngagementPolicy::Everyone,
            "stanford.edu",
            "stanford.edu"
        ));
    }

    #[test]
    fn engage_university_policy_checks_affiliation() {
        assert!(can_engage(
            false,
            EngagementPolicy::University,
            "stanford.edu",
            "stanford.edu"
        ));
        assert!(!can_engage(
            false,
            EngagementPolicy::University,
            "berkeley.edu",
            "stanford.edu"
        ));
    }

    #[test]
    fn engage_everyone_policy_ignores_affiliation() {
        assert!(can_engage(
            false,
            EngagementPolicy::Everyone,
            "berkeley.edu",
            "stanford.edu"
        ));
    }

    #[test]
    fn default_settings() {
        let s = PrivacySettings::defaults(Uuid::new_v4());
        assert_eq!(s.profile_visibility, ProfileVisibility::University);
        assert_eq!(s.who_can_react, EngagementPolicy::Everyone);
        assert_eq!(s.who_can_comment, EngagementPolicy::Everyone);
    }
}
