//! User registry - wallet connect and role assignment
//!
//! Wallets connect as borrowers. Lender and admin roles require the shared
//! demo access code from `LendingConfig`, which is a reviewer backdoor and
//! must not be used as production authentication.

use crate::audit::AuditService;
use crate::error::{BusinessError, BusinessResult};
use crate::services::ServiceContext;
use serde_json::json;
use tracing::{debug, info, warn};
use veilcredit_core::{normalize_wallet_address, AuditAction, NewAuditEntry, Role, User};
use veilcredit_persistence::UserRepo;

/// What `connect` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub user: User,
    pub registered: bool,
    /// Set when an existing user's role changed
    pub previous_role: Option<Role>,
}

impl ConnectOutcome {
    pub fn is_unchanged(&self) -> bool {
        !self.registered && self.previous_role.is_none()
    }
}

/// User Service - identity resolution and registration
pub struct UserService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> UserService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Register a wallet or switch its role.
    pub async fn connect(
        &self,
        wallet_address: &str,
        requested_role: Option<Role>,
        access_code: Option<&str>,
    ) -> BusinessResult<ConnectOutcome> {
        let wallet = normalize_wallet_address(wallet_address)?;

        if let Some(role) = requested_role.filter(|r| r.is_privileged()) {
            self.check_access_code(&wallet, role, access_code)?;
        }

        let row = match UserRepo::find_by_wallet(self.ctx.pool(), &wallet).await? {
            Some(row) => row,
            None => {
                if let Some(outcome) = self.register(&wallet, requested_role).await? {
                    return Ok(outcome);
                }
                // lost a registration race; continue with the winner's row
                UserRepo::find_by_wallet(self.ctx.pool(), &wallet)
                    .await?
                    .ok_or_else(|| BusinessError::not_found("User", &wallet))?
            }
        };

        let mut user = User::try_from(row)?;
        let previous = user.role;

        match requested_role {
            Some(role) if role != previous => {
                let mut tx = self.ctx.begin().await?;
                UserRepo::update_role(&mut *tx, &user.id, role).await?;
                AuditService::record_in(
                    &mut tx,
                    NewAuditEntry::new(AuditAction::RoleChanged)
                        .with_user(&user.id)
                        .with_entity("user", &user.id)
                        .with_metadata(json!({
                            "from": previous.as_str(),
                            "to": role.as_str(),
                        })),
                )
                .await?;
                self.ctx.commit(tx).await?;

                user.role = role;
                info!(user_id = %user.id, from = %previous, to = %role, "Role changed");
                Ok(ConnectOutcome {
                    user,
                    registered: false,
                    previous_role: Some(previous),
                })
            }
            _ => Ok(ConnectOutcome {
                user,
                registered: false,
                previous_role: None,
            }),
        }
    }

    /// Insert a new user. `None` when another connection registered the
    /// same wallet first.
    async fn register(
        &self,
        wallet: &str,
        requested_role: Option<Role>,
    ) -> BusinessResult<Option<ConnectOutcome>> {
        let user = User::new(wallet, requested_role.unwrap_or(Role::Borrower))?;

        let mut tx = self.ctx.begin().await?;
        if let Err(err) = UserRepo::insert(&mut *tx, &user).await {
            if err.is_unique_violation() {
                debug!(wallet, "Wallet registered concurrently");
                return Ok(None);
            }
            return Err(err.into());
        }
        AuditService::record_in(
            &mut tx,
            NewAuditEntry::new(AuditAction::UserRegistered)
                .with_user(&user.id)
                .with_entity("user", &user.id)
                .with_metadata(json!({ "role": user.role.as_str() })),
        )
        .await?;
        self.ctx.commit(tx).await?;

        info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(Some(ConnectOutcome {
            user,
            registered: true,
            previous_role: None,
        }))
    }

    /// Look up a wallet. Unknown or malformed addresses resolve to `None`.
    pub async fn resolve(&self, wallet_address: &str) -> BusinessResult<Option<User>> {
        let wallet = match normalize_wallet_address(wallet_address) {
            Ok(wallet) => wallet,
            Err(_) => return Ok(None),
        };

        match UserRepo::find_by_wallet(self.ctx.pool(), &wallet).await? {
            Some(row) => Ok(Some(User::try_from(row)?)),
            None => Ok(None),
        }
    }

    pub async fn get(&self, user_id: &str) -> BusinessResult<User> {
        self.ctx
            .load_user(user_id)
            .await?
            .ok_or_else(|| BusinessError::not_found("User", user_id))
    }

    fn check_access_code(
        &self,
        wallet: &str,
        role: Role,
        access_code: Option<&str>,
    ) -> BusinessResult<()> {
        let expected = self.ctx.config().demo_access_code.as_str();
        match access_code {
            Some(code) if !expected.is_empty() && code == expected => {
                warn!(wallet, role = %role, "Privileged role granted via demo access code; not for production use");
                Ok(())
            }
            _ => Err(BusinessError::permission(
                "unknown",
                &format!("connect as {}", role),
            )),
        }
    }
}
