use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum Role {
    Admin,
    Moderator,
    User,
}

impl Role {
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            "user" => Ok(Self::User),
            other => Err(AppError::Validation(format!("unknown role '{other}'"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::User => "user",
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    pub fn at_least_moderator(self) -> bool {
        matches!(self, Self::Admin | Self::Moderator)
    }
}

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Visibility {
    Global,
    Related { user_id: String },
}

pub fn visibility(actor: &CurrentUser) -> Visibility {
    match actor.role {
        Role::Admin => Visibility::Global,
        Role::Moderator | Role::User => Visibility::Related {
            user_id: actor.id.clone(),
        },
    }
}

#[derive(Debug, Clone)]
pub struct ProjectRelation {
    pub created_by: String,
    pub is_member: bool,
}

#[derive(Debug, Clone)]
pub struct TaskRelation {
    pub assigned_to: String,
    pub created_by: String,
    pub project: ProjectRelation,
}

pub fn can_read_project(actor: &CurrentUser, project: &ProjectRelation) -> bool {
    actor.role.is_admin() || project.created_by == actor.id || project.is_member
}

pub fn can_manage_project(actor: &CurrentUser, project: &ProjectRelation) -> bool {
    actor.role.is_admin() || project.created_by == actor.id
}

pub fn can_read_task(actor: &CurrentUser, task: &TaskRelation) -> bool {
    task.assigned_to == actor.id
        || task.created_by == actor.id
        || can_read_project(actor, &task.project)
}

pub fn can_update_task(actor: &CurrentUser, task: &TaskRelation) -> bool {
    can_read_task(actor, task)
}

pub fn can_reassign_task(actor: &CurrentUser, task: &TaskRelation) -> bool {
    can_update_task(actor, task)
        && (actor.role.at_least_moderator() || task.project.created_by == actor.id)
}

pub fn can_change_task_status(actor: &CurrentUser, task: &TaskRelation) -> bool {
    actor.role.is_admin()
        || task.assigned_to == actor.id
        || task.created_by == actor.id
        || task.project.created_by == actor.id
}

pub fn can_delete_task(actor: &CurrentUser, task: &TaskRelation) -> bool {
    actor.role.is_admin() || task.created_by == actor.id || task.project.created_by == actor.id
}

pub fn can_read_ticket(actor: &CurrentUser, resolved_by: &str, task: &TaskRelation) -> bool {
    resolved_by == actor.id || can_read_task(actor, task)
}

pub fn can_update_ticket(actor: &CurrentUser, resolved_by: &str, task: &TaskRelation) -> bool {
    actor.role.is_admin() || resolved_by == actor.id || task.project.created_by == actor.id
}

pub fn can_verify_ticket(actor: &CurrentUser, task: &TaskRelation) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Moderator => task.project.created_by == actor.id || task.project.is_member,
        Role::User => false,
    }
}

pub fn can_delete_ticket(actor: &CurrentUser, resolved_by: &str, task: &TaskRelation) -> bool {
    actor.role.is_admin() || resolved_by == actor.id || task.project.created_by == actor.id
}

pub fn can_view_user(actor: &CurrentUser, target_id: &str) -> bool {
    actor.id == target_id || actor.role.at_least_moderator()
}

pub fn can_edit_user(actor: &CurrentUser, target_id: &str, target_role: Role) -> bool {
    if actor.id == target_id || actor.role.is_admin() {
        return true;
    }
    actor.role == Role::Moderator && target_role != Role::Admin
}
