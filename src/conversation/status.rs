use std::fmt;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// The four multi-step flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum FlowId {
    SetProgress,
    SetBook,
    AddUser,
    RemoveUser,
}

/// A step tag. The snake_case form is exactly what `users.status` stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Step {
    // SetProgress
    EnterBookType,
    EnterTotalPages,
    EnterPage,
    EnterPercent,
    // SetBook
    EnterBookName,
    EnterAuthor,
    EnterFinishingDate,
    // AddUser
    EnterNickname,
    EnterUsername,
    // RemoveUser
    EnterNicknameToRemove,
}

impl Step {
    /// Stored tag of this step
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Flow that owns this step
    pub fn flow(self) -> FlowId {
        match self {
            Step::EnterBookType | Step::EnterTotalPages | Step::EnterPage | Step::EnterPercent => FlowId::SetProgress,
            Step::EnterBookName | Step::EnterAuthor | Step::EnterFinishingDate => FlowId::SetBook,
            Step::EnterNickname | Step::EnterUsername => FlowId::AddUser,
            Step::EnterNicknameToRemove => FlowId::RemoveUser,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a member is in their conversation, decoded from `users.status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationStatus {
    Idle,
    InFlow { flow: FlowId, step: Step },
    /// Stored value no flow declares; kept verbatim for diagnosis
    Corrupted(String),
}

impl ConversationStatus {
    /// Status for being at `step`
    pub fn at(step: Step) -> Self {
        ConversationStatus::InFlow { flow: step.flow(), step }
    }

    /// Decodes a stored status. Never fails: unknown tags become `Corrupted`.
    pub fn decode(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return ConversationStatus::Idle;
        }
        match raw.parse::<Step>() {
            Ok(step) => ConversationStatus::at(step),
            Err(_) => ConversationStatus::Corrupted(raw.to_string()),
        }
    }

    /// Value to store; `Idle` is the empty string
    pub fn encode(&self) -> &str {
        match self {
            ConversationStatus::Idle => "",
            ConversationStatus::InFlow { step, .. } => step.as_str(),
            ConversationStatus::Corrupted(raw) => raw,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ConversationStatus::Idle)
    }

    pub fn step(&self) -> Option<Step> {
        match self {
            ConversationStatus::InFlow { step, .. } => Some(*step),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_empty_status_is_idle() {
        assert_eq!(ConversationStatus::decode(""), ConversationStatus::Idle);
        assert_eq!(ConversationStatus::decode("   "), ConversationStatus::Idle);
        assert_eq!(ConversationStatus::Idle.encode(), "");
    }

    #[test]
    fn test_stored_tags_match_step_names() {
        assert_eq!(Step::EnterBookType.as_str(), "enter_book_type");
        assert_eq!(Step::EnterTotalPages.as_str(), "enter_total_pages");
        assert_eq!(Step::EnterFinishingDate.as_str(), "enter_finishing_date");
        assert_eq!(Step::EnterNicknameToRemove.as_str(), "enter_nickname_to_remove");
    }

    #[test]
    fn test_every_step_decodes_into_its_flow() {
        for step in Step::iter() {
            let status = ConversationStatus::decode(step.as_str());
            assert_eq!(status, ConversationStatus::InFlow { flow: step.flow(), step });
            assert_eq!(status.encode(), step.as_str());
        }
    }

    #[test]
    fn test_unknown_tag_is_corrupted_not_error() {
        let status = ConversationStatus::decode("enter_favourite_colour");
        assert_eq!(status, ConversationStatus::Corrupted("enter_favourite_colour".to_string()));
        assert!(!status.is_idle());
        assert_eq!(status.step(), None);
    }

    #[test]
    fn test_flow_ownership() {
        assert_eq!(Step::EnterPercent.flow(), FlowId::SetProgress);
        assert_eq!(Step::EnterAuthor.flow(), FlowId::SetBook);
        assert_eq!(Step::EnterUsername.flow(), FlowId::AddUser);
        assert_eq!(Step::EnterNicknameToRemove.flow(), FlowId::RemoveUser);
    }
}
