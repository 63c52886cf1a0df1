use chrono::Utc;
use log::info;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Account, AuthenticatedUser, Role, SeedAccount};

const SEED_USERS: &str = include_str!("../../fixtures/users.json");

#[derive(Debug)]
pub enum DirectoryError {
    EmailTaken,
    Fixture(serde_json::Error),
    Hash(bcrypt::BcryptError),
    Task(tokio::task::JoinError),
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::EmailTaken => write!(f, "An account with this email already exists"),
            DirectoryError::Fixture(e) => write!(f, "Invalid user fixture: {}", e),
            DirectoryError::Hash(e) => write!(f, "Password hashing failed: {}", e),
            DirectoryError::Task(e) => write!(f, "Password hashing task failed: {}", e),
        }
    }
}

impl From<bcrypt::BcryptError> for DirectoryError {
    fn from(e: bcrypt::BcryptError) -> Self {
        DirectoryError::Hash(e)
    }
}

/// New account produced by a completed registration.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
}

/// In-memory account store standing in for a user database.
pub struct UserDirectory {
    accounts: RwLock<Vec<Account>>,
    bcrypt_cost: u32,
}

impl UserDirectory {
    #[cfg(test)]
    pub fn empty(bcrypt_cost: u32) -> Self {
        UserDirectory {
            accounts: RwLock::new(Vec::new()),
            bcrypt_cost,
        }
    }

    /// Loads the bundled admin and lessor accounts.
    pub fn seeded(bcrypt_cost: u32) -> Result<Self, DirectoryError> {
        let seeds: Vec<SeedAccount> =
            serde_json::from_str(SEED_USERS).map_err(DirectoryError::Fixture)?;

        let mut accounts = Vec::with_capacity(seeds.len());
        for seed in seeds {
            accounts.push(Account {
                id: seed.id,
                email: seed.email.to_lowercase(),
                password_hash: bcrypt::hash(&seed.password, bcrypt_cost)?,
                first_name: seed.first_name,
                last_name: seed.last_name,
                national_id: None,
                role: seed.role,
                is_active: seed.is_active,
                created_at: Utc::now(),
            });
        }
        info!("✓ Loaded {} seed accounts", accounts.len());

        Ok(UserDirectory {
            accounts: RwLock::new(accounts),
            bcrypt_cost,
        })
    }

    /// Returns the principal for a matching, active account.
    pub async fn authenticate(&self, email: &str, password: &str) -> Option<AuthenticatedUser> {
        let email = email.trim().to_lowercase();
        let (user, password_hash) = {
            let accounts = self.accounts.read().await;
            let account = accounts.iter().find(|a| a.email == email && a.is_active)?;
            let user = AuthenticatedUser {
                id: account.id,
                email: account.email.clone(),
                role: account.role,
            };
            (user, account.password_hash.clone())
        };

        let password = password.to_string();
        let verified =
            tokio::task::spawn_blocking(move || bcrypt::verify(password, &password_hash)).await;
        match verified {
            Ok(Ok(true)) => Some(user),
            _ => None,
        }
    }

    pub async fn register(&self, new: NewAccount) -> Result<Account, DirectoryError> {
        let email = new.email.trim().to_lowercase();
        let cost = self.bcrypt_cost;
        let password = new.password;
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(DirectoryError::Task)??;

        let mut accounts = self.accounts.write().await;
        if accounts.iter().any(|a| a.email == email) {
            return Err(DirectoryError::EmailTaken);
        }

        let account = Account {
            id: Uuid::new_v4(),
            email,
            password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            national_id: Some(new.national_id),
            role: Role::Renter,
            is_active: true,
            created_at: Utc::now(),
        };
        accounts.push(account.clone());
        Ok(account)
    }

    pub async fn email_taken(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.accounts.read().await.iter().any(|a| a.email == email)
    }

    /// Whether `id` still names an account that may act.
    pub async fn is_active(&self, id: Uuid) -> bool {
        self.accounts
            .read()
            .await
            .iter()
            .any(|a| a.id == id && a.is_active)
    }

    pub async fn list(&self) -> Vec<Account> {
        self.accounts.read().await.clone()
    }

    pub async fn set_active(&self, id: Uuid, is_active: bool) -> Option<Account> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.iter_mut().find(|a| a.id == id)?;
        account.is_active = is_active;
        Some(account.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            password: "abcd1234".to_string(),
            first_name: "Somchai".to_string(),
            last_name: "Jaidee".to_string(),
            national_id: "1101700230708".to_string(),
        }
    }

    #[tokio::test]
    async fn seeded_admin_can_log_in() {
        let users = UserDirectory::seeded(TEST_COST).unwrap();
        let admin = users.authenticate("admin@farmrent.co.th", "admin1234").await.unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(users.authenticate("admin@farmrent.co.th", "wrong").await.is_none());
    }

    #[tokio::test]
    async fn registered_accounts_are_renters() {
        let users = UserDirectory::empty(TEST_COST);
        let account = users.register(new_account("Somchai@Farm.co.th")).await.unwrap();
        assert_eq!(account.role, Role::Renter);
        assert!(users.email_taken("somchai@farm.co.th").await);

        let user = users.authenticate("somchai@farm.co.th", "abcd1234").await.unwrap();
        assert_eq!(user.id, account.id);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let users = UserDirectory::empty(TEST_COST);
        users.register(new_account("a@farm.co.th")).await.unwrap();
        assert!(matches!(
            users.register(new_account("A@farm.co.th")).await,
            Err(DirectoryError::EmailTaken)
        ));
    }

    #[tokio::test]
    async fn deactivated_accounts_cannot_log_in() {
        let users = UserDirectory::empty(TEST_COST);
        let account = users.register(new_account("b@farm.co.th")).await.unwrap();
        assert!(users.is_active(account.id).await);
        users.set_active(account.id, false).await.unwrap();
        assert!(users.authenticate("b@farm.co.th", "abcd1234").await.is_none());
        assert!(!users.is_active(account.id).await);
        assert!(!users.is_active(Uuid::new_v4()).await);
    }
}
