use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum TaskStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
    Approved,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Open,
        TaskStatus::InProgress,
        TaskStatus::Resolved,
        TaskStatus::Closed,
        TaskStatus::Approved,
        TaskStatus::Cancelled,
    ];

    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "open" => Ok(Self::Open),
            "in-progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            "approved" => Ok(Self::Approved),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(AppError::Validation(format!(
                "invalid task status '{other}'"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in-progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Approved => "approved",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum TicketStatus {
    Pending,
    Verified,
    Rejected,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::Pending,
        TicketStatus::Verified,
        TicketStatus::Rejected,
        TicketStatus::Closed,
    ];

    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "rejected" => Ok(Self::Rejected),
            "closed" => Ok(Self::Closed),
            other => Err(AppError::Validation(format!(
                "invalid ticket status '{other}'"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
            Self::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum VerifyOutcome {
    Verified,
    Rejected,
}

impl VerifyOutcome {
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "verified" => Ok(Self::Verified),
            "rejected" => Ok(Self::Rejected),
            other => Err(AppError::Validation(format!(
                "verification status must be 'verified' or 'rejected', got '{other}'"
            ))),
        }
    }

    pub fn ticket_status(self) -> TicketStatus {
        match self {
            Self::Verified => TicketStatus::Verified,
            Self::Rejected => TicketStatus::Rejected,
        }
    }

    pub fn task_status(self) -> TaskStatus {
        match self {
            Self::Verified => TaskStatus::Closed,
            Self::Rejected => TaskStatus::InProgress,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Resolution {
    Fixed,
    Duplicate,
    WontFix,
    CannotReproduce,
    WorksAsDesigned,
}

impl Resolution {
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "fixed" => Ok(Self::Fixed),
            "duplicate" => Ok(Self::Duplicate),
            "wont-fix" => Ok(Self::WontFix),
            "cannot-reproduce" => Ok(Self::CannotReproduce),
            "works-as-designed" => Ok(Self::WorksAsDesigned),
            other => Err(AppError::Validation(format!(
                "invalid resolution '{other}'"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Duplicate => "duplicate",
            Self::WontFix => "wont-fix",
            Self::CannotReproduce => "cannot-reproduce",
            Self::WorksAsDesigned => "works-as-designed",
        }
    }
}

pub fn check_manual_task_transition(from: TaskStatus, to: TaskStatus) -> AppResult<()> {
    if from == to {
        return Ok(());
    }
    let allowed = matches!(
        (from, to),
        (TaskStatus::Open, TaskStatus::InProgress)
            | (TaskStatus::Open, TaskStatus::Cancelled)
            | (TaskStatus::InProgress, TaskStatus::Cancelled)
            | (TaskStatus::Closed, TaskStatus::Approved)
    );
    if allowed {
        Ok(())
    } else {
        Err(AppError::InvalidTransition(format!(
            "task cannot move from '{}' to '{}'",
            from.as_str(),
            to.as_str()
        )))
    }
}

pub fn check_ticket_creation(task_status: TaskStatus) -> AppResult<()> {
    if matches!(task_status, TaskStatus::Resolved | TaskStatus::Closed) {
        Err(AppError::InvalidTransition(format!(
            "task is already '{}', delete or reject its ticket first",
            task_status.as_str()
        )))
    } else {
        Ok(())
    }
}

pub fn check_ticket_verify(current: TicketStatus) -> AppResult<()> {
    if current == TicketStatus::Pending {
        Ok(())
    } else {
        Err(AppError::InvalidTransition(format!(
            "only pending tickets can be verified, ticket is '{}'",
            current.as_str()
        )))
    }
}

pub fn check_ticket_close(current: TicketStatus) -> AppResult<()> {
    if current == TicketStatus::Verified {
        Ok(())
    } else {
        Err(AppError::InvalidTransition(format!(
            "only verified tickets can be closed, ticket is '{}'",
            current.as_str()
        )))
    }
}

pub fn check_ticket_update(current: TicketStatus) -> AppResult<()> {
    if current == TicketStatus::Pending {
        Ok(())
    } else {
        Err(AppError::InvalidTransition(format!(
            "only pending tickets can be edited, ticket is '{}'",
            current.as_str()
        )))
    }
}

pub fn check_ticket_delete(current: TicketStatus) -> AppResult<()> {
    if matches!(current, TicketStatus::Pending | TicketStatus::Rejected) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition(format!(
            "only pending or rejected tickets can be deleted, ticket is '{}'",
            current.as_str()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_task_edges_are_limited() {
        assert!(check_manual_task_transition(TaskStatus::Open, TaskStatus::InProgress).is_ok());
        assert!(check_manual_task_transition(TaskStatus::Open, TaskStatus::Cancelled).is_ok());
        assert!(
            check_manual_task_transition(TaskStatus::InProgress, TaskStatus::Cancelled).is_ok()
        );
        assert!(check_manual_task_transition(TaskStatus::Closed, TaskStatus::Approved).is_ok());
    }

    #[test]
    fn cascade_edges_are_rejected_for_manual_updates() {
        assert!(
            check_manual_task_transition(TaskStatus::InProgress, TaskStatus::Resolved).is_err()
        );
        assert!(check_manual_task_transition(TaskStatus::Resolved, TaskStatus::Closed).is_err());
        assert!(
            check_manual_task_transition(TaskStatus::Resolved, TaskStatus::InProgress).is_err()
        );
        assert!(check_manual_task_transition(TaskStatus::Closed, TaskStatus::InProgress).is_err());
        assert!(check_manual_task_transition(TaskStatus::Open, TaskStatus::Closed).is_err());
    }

    #[test]
    fn terminal_statuses_have_no_manual_exits() {
        assert!(check_manual_task_transition(TaskStatus::Approved, TaskStatus::Open).is_err());
        assert!(
            check_manual_task_transition(TaskStatus::Cancelled, TaskStatus::InProgress).is_err()
        );
    }

    #[test]
    fn unchanged_status_is_not_a_transition() {
        assert!(check_manual_task_transition(TaskStatus::Open, TaskStatus::Open).is_ok());
        assert!(check_manual_task_transition(TaskStatus::Resolved, TaskStatus::Resolved).is_ok());
    }

    #[test]
    fn ticket_creation_requires_unresolved_task() {
        assert!(check_ticket_creation(TaskStatus::Open).is_ok());
        assert!(check_ticket_creation(TaskStatus::InProgress).is_ok());
        assert!(check_ticket_creation(TaskStatus::Resolved).is_err());
        assert!(check_ticket_creation(TaskStatus::Closed).is_err());
    }

    #[test]
    fn ticket_lifecycle_preconditions() {
        assert!(check_ticket_verify(TicketStatus::Pending).is_ok());
        assert!(check_ticket_verify(TicketStatus::Verified).is_err());
        assert!(check_ticket_verify(TicketStatus::Rejected).is_err());

        assert!(check_ticket_close(TicketStatus::Verified).is_ok());
        assert!(check_ticket_close(TicketStatus::Pending).is_err());
        assert!(check_ticket_close(TicketStatus::Closed).is_err());

        assert!(check_ticket_delete(TicketStatus::Pending).is_ok());
        assert!(check_ticket_delete(TicketStatus::Rejected).is_ok());
        assert!(check_ticket_delete(TicketStatus::Verified).is_err());
        assert!(check_ticket_delete(TicketStatus::Closed).is_err());

        assert!(check_ticket_update(TicketStatus::Pending).is_ok());
        assert!(check_ticket_update(TicketStatus::Closed).is_err());
    }

    #[test]
    fn verify_outcome_maps_to_both_machines() {
        let verified = VerifyOutcome::parse("verified").unwrap();
        assert_eq!(verified.ticket_status(), TicketStatus::Verified);
        assert_eq!(verified.task_status(), TaskStatus::Closed);

        let rejected = VerifyOutcome::parse("rejected").unwrap();
        assert_eq!(rejected.ticket_status(), TicketStatus::Rejected);
        assert_eq!(rejected.task_status(), TaskStatus::InProgress);

        assert!(VerifyOutcome::parse("closed").is_err());
    }

    #[test]
    fn status_strings_round_trip() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::parse(status.as_str()).unwrap(), status);
        }
        for status in TicketStatus::ALL {
            assert_eq!(TicketStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(TaskStatus::parse("in_progress").is_err());
        assert!(TicketStatus::parse("open").is_err());
    }
}
