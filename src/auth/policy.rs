//! Admin-only access to user management.
//!
//! Every ability requires the admin flag. Deletion also requires a target
//! other than the actor: nobody can delete their own account.

use tracing::warn;

use crate::{error::AppError, users::model::User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ability {
    ViewAny,
    View,
    Create,
    Update,
    Delete,
}

pub fn can(actor: &User, ability: Ability, target: Option<&User>) -> bool {
    match ability {
        Ability::ViewAny | Ability::View | Ability::Create | Ability::Update => actor.is_admin,
        Ability::Delete => match target {
            Some(target) => actor.is_admin && actor.id != target.id,
            None => false,
        },
    }
}

/// [`can`], with a denial turned into [`AppError::Forbidden`].
pub fn authorize(actor: &User, ability: Ability, target: Option<&User>) -> Result<(), AppError> {
    if can(actor, ability, target) {
        return Ok(());
    }
    warn!(
        actor_id = %actor.id,
        ability = ?ability,
        target_id = ?target.map(|t| t.id),
        "authorization denied"
    );
    Err(AppError::Forbidden)
}
