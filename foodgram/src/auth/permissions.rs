//! Role-based access policy.
//!
//! The decision is a pure function of the caller's [`Role`], the [`Resource`], whether the caller
//! owns the target ([`Ownership`]) and the [`Action`] requested. Roles grant *operations* per
//! resource: an `*All` operation applies to every entity, an `*Own` operation only to entities
//! the caller owns. Anonymous callers are evaluated as [`Role::Guest`].
//!
//! Handlers reach the policy through the [`AccessPolicy`] object held in [`AppState`], either
//! directly with [`require`] when ownership matters, or through the [`RequiresPermission`]
//! extractor for checks that do not depend on a particular entity.

use std::{fmt, marker::PhantomData, ops::Deref};

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    api::models::users::{CurrentUser, Role},
    errors::{Error, Result},
    types::{Operation, Permission, Resource},
    AppState,
};

/// What the caller wants to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

/// Whether the target entity belongs to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    Owner,
    NotOwner,
}

impl Ownership {
    pub fn of(caller: Option<&CurrentUser>, owner_id: crate::types::UserId) -> Self {
        match caller {
            Some(user) if user.id == owner_id => Ownership::Owner,
            _ => Ownership::NotOwner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Action {
    fn all(self) -> Operation {
        match self {
            Action::Create => Operation::CreateAll,
            Action::Read => Operation::ReadAll,
            Action::Update => Operation::UpdateAll,
            Action::Delete => Operation::DeleteAll,
        }
    }

    fn own(self) -> Operation {
        match self {
            Action::Create => Operation::CreateOwn,
            Action::Read => Operation::ReadOwn,
            Action::Update => Operation::UpdateOwn,
            Action::Delete => Operation::DeleteOwn,
        }
    }
}

impl From<Operation> for (Action, Ownership) {
    fn from(operation: Operation) -> Self {
        match operation {
            Operation::CreateAll => (Action::Create, Ownership::NotOwner),
            Operation::CreateOwn => (Action::Create, Ownership::Owner),
            Operation::ReadAll => (Action::Read, Ownership::NotOwner),
            Operation::ReadOwn => (Action::Read, Ownership::Owner),
            Operation::UpdateAll => (Action::Update, Ownership::NotOwner),
            Operation::UpdateOwn => (Action::Update, Ownership::Owner),
            Operation::DeleteAll => (Action::Delete, Ownership::NotOwner),
            Operation::DeleteOwn => (Action::Delete, Ownership::Owner),
        }
    }
}

const READ_ONLY: &[Operation] = &[Operation::ReadAll];
const EVERYTHING: &[Operation] = &[
    Operation::CreateAll,
    Operation::ReadAll,
    Operation::UpdateAll,
    Operation::DeleteAll,
];
const OWN_LIST: &[Operation] = &[Operation::CreateOwn, Operation::ReadOwn, Operation::DeleteOwn];

/// Operations a role holds on a resource
pub fn role_grants(role: Role, resource: Resource) -> &'static [Operation] {
    match (role, resource) {
        (Role::Admin, _) => EVERYTHING,

        (Role::Guest, Resource::Users | Resource::Tags | Resource::Ingredients | Resource::Recipes) => READ_ONLY,
        (Role::Guest, Resource::Favorites | Resource::ShoppingCart | Resource::Subscriptions) => &[],

        (Role::User, Resource::Users) => &[Operation::ReadAll, Operation::UpdateOwn],
        (Role::User, Resource::Tags | Resource::Ingredients) => READ_ONLY,
        (Role::User, Resource::Recipes) => &[
            Operation::ReadAll,
            Operation::CreateOwn,
            Operation::UpdateOwn,
            Operation::DeleteOwn,
        ],
        (Role::User, Resource::Favorites | Resource::ShoppingCart | Resource::Subscriptions) => OWN_LIST,
    }
}

/// Decide whether `role` may perform `action` on a `resource` with the given ownership
pub fn authorize(role: Role, resource: Resource, ownership: Ownership, action: Action) -> Decision {
    let grants = role_grants(role, resource);
    let allowed = grants.contains(&action.all()) || (ownership == Ownership::Owner && grants.contains(&action.own()));
    if allowed {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// Pluggable access policy held in application state
pub trait AccessPolicy: Send + Sync + fmt::Debug {
    fn decide(&self, role: Role, resource: Resource, ownership: Ownership, action: Action) -> Decision;
}

/// The default policy: the static role table above
#[derive(Debug, Clone, Copy, Default)]
pub struct RolePolicy;

impl AccessPolicy for RolePolicy {
    fn decide(&self, role: Role, resource: Resource, ownership: Ownership, action: Action) -> Decision {
        authorize(role, resource, ownership, action)
    }
}

/// Check the policy for a (possibly anonymous) caller.
///
/// A denied anonymous caller gets `Unauthenticated`, a denied authenticated caller gets
/// `InsufficientPermissions`.
pub fn require(
    policy: &dyn AccessPolicy,
    caller: Option<&CurrentUser>,
    resource: Resource,
    ownership: Ownership,
    action: Action,
) -> Result<()> {
    let role = caller.map(|user| user.role).unwrap_or(Role::Guest);
    match policy.decide(role, resource, ownership, action) {
        Decision::Allow => Ok(()),
        Decision::Deny if caller.is_none() => Err(Error::Unauthenticated { message: None }),
        Decision::Deny => Err(Error::InsufficientPermissions {
            required: Permission::Any(vec![
                Permission::Allow(resource, action.all()),
                Permission::Allow(resource, action.own()),
            ]),
            action: match ownership {
                Ownership::Owner => action.own(),
                Ownership::NotOwner => action.all(),
            },
            resource: resource.to_string(),
        }),
    }
}

pub trait ResourceMarker: Send + Sync + 'static {
    const RESOURCE: Resource;
}

pub trait OperationMarker: Send + Sync + 'static {
    const OPERATION: Operation;
}

/// Marker types naming resources at the type level
pub mod resource {
    use super::ResourceMarker;
    use crate::types::Resource;

    macro_rules! resources {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl ResourceMarker for $name {
                    const RESOURCE: Resource = Resource::$name;
                }
            )*
        };
    }

    resources!(Users, Tags, Ingredients, Recipes, Favorites, ShoppingCart, Subscriptions);
}

/// Marker types naming operations at the type level
pub mod operation {
    use super::OperationMarker;
    use crate::types::Operation;

    macro_rules! operations {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl OperationMarker for $name {
                    const OPERATION: Operation = Operation::$name;
                }
            )*
        };
    }

    operations!(CreateAll, CreateOwn, ReadAll, ReadOwn, UpdateAll, UpdateOwn, DeleteAll, DeleteOwn);
}

/// Extractor that authenticates the caller and checks an entity-independent permission.
///
/// `*Own` operations pass when the caller could act on their own entities; handlers still
/// check ownership of the concrete target with [`require`].
pub struct RequiresPermission<R: ResourceMarker, O: OperationMarker> {
    pub user: CurrentUser,
    _marker: PhantomData<(R, O)>,
}

impl<R: ResourceMarker, O: OperationMarker> Deref for RequiresPermission<R, O> {
    type Target = CurrentUser;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl<R: ResourceMarker, O: OperationMarker> FromRequestParts<AppState> for RequiresPermission<R, O> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        let (action, ownership) = O::OPERATION.into();
        require(state.policy.as_ref(), Some(&user), R::RESOURCE, ownership, action)?;

        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "someone".to_string(),
            email: "someone@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn test_guest_reads_public_data_only() {
        for resource in [Resource::Users, Resource::Tags, Resource::Ingredients, Resource::Recipes] {
            assert_eq!(authorize(Role::Guest, resource, Ownership::NotOwner, Action::Read), Decision::Allow);
            assert_eq!(authorize(Role::Guest, resource, Ownership::NotOwner, Action::Create), Decision::Deny);
        }
        assert_eq!(
            authorize(Role::Guest, Resource::ShoppingCart, Ownership::Owner, Action::Read),
            Decision::Deny
        );
    }

    #[test]
    fn test_user_edits_only_own_recipes() {
        assert_eq!(authorize(Role::User, Resource::Recipes, Ownership::Owner, Action::Update), Decision::Allow);
        assert_eq!(authorize(Role::User, Resource::Recipes, Ownership::NotOwner, Action::Update), Decision::Deny);
        assert_eq!(authorize(Role::User, Resource::Recipes, Ownership::Owner, Action::Delete), Decision::Allow);
        assert_eq!(authorize(Role::User, Resource::Recipes, Ownership::NotOwner, Action::Delete), Decision::Deny);
        assert_eq!(authorize(Role::User, Resource::Recipes, Ownership::Owner, Action::Create), Decision::Allow);
    }

    #[test]
    fn test_user_cannot_manage_reference_data() {
        for resource in [Resource::Tags, Resource::Ingredients] {
            for action in [Action::Create, Action::Update, Action::Delete] {
                assert_eq!(authorize(Role::User, resource, Ownership::NotOwner, action), Decision::Deny);
            }
        }
    }

    #[test]
    fn test_admin_can_do_everything() {
        for resource in [
            Resource::Users,
            Resource::Tags,
            Resource::Ingredients,
            Resource::Recipes,
            Resource::Favorites,
            Resource::ShoppingCart,
            Resource::Subscriptions,
        ] {
            for action in [Action::Create, Action::Read, Action::Update, Action::Delete] {
                assert_eq!(authorize(Role::Admin, resource, Ownership::NotOwner, action), Decision::Allow);
            }
        }
    }

    #[test]
    fn test_require_distinguishes_anonymous_and_forbidden() {
        let policy = RolePolicy;

        let anonymous = require(&policy, None, Resource::Recipes, Ownership::NotOwner, Action::Create).unwrap_err();
        assert!(matches!(anonymous, Error::Unauthenticated { .. }));

        let someone = user(Role::User);
        let forbidden = require(&policy, Some(&someone), Resource::Recipes, Ownership::NotOwner, Action::Update).unwrap_err();
        match forbidden {
            Error::InsufficientPermissions { action, resource, .. } => {
                assert_eq!(action, Operation::UpdateAll);
                assert_eq!(resource, "recipes");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(require(&policy, None, Resource::Recipes, Ownership::NotOwner, Action::Read).is_ok());
    }

    #[test]
    fn test_ownership_of() {
        let someone = user(Role::User);
        assert_eq!(Ownership::of(Some(&someone), someone.id), Ownership::Owner);
        assert_eq!(Ownership::of(Some(&someone), Uuid::new_v4()), Ownership::NotOwner);
        assert_eq!(Ownership::of(None, someone.id), Ownership::NotOwner);
    }

    #[derive(Debug)]
    struct ReadOnlyPolicy;

    impl AccessPolicy for ReadOnlyPolicy {
        fn decide(&self, _role: Role, _resource: Resource, _ownership: Ownership, action: Action) -> Decision {
            if action == Action::Read {
                Decision::Allow
            } else {
                Decision::Deny
            }
        }
    }

    #[test]
    fn test_policy_is_swappable() {
        let admin = user(Role::Admin);
        assert!(require(&ReadOnlyPolicy, Some(&admin), Resource::Tags, Ownership::NotOwner, Action::Delete).is_err());
        assert!(require(&RolePolicy, Some(&admin), Resource::Tags, Ownership::NotOwner, Action::Delete).is_ok());
    }
}
