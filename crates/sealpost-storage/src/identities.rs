//! Identity store: registered users, their login index and their
//! long-term key pairs.
//!
//! Trees:
//!
//! - `users`: `user_id -> sealed UserIdentity`
//! - `emails`: `SHA3-256(email) -> user_id`
//! - `private_keys`: `user_id -> sealed private scalar`
//!
//! Registration writes all three in one sled transaction, so two
//! concurrent registrations of the same id or email cannot both
//! succeed. Records are never mutated or deleted.

use sealpost_crypto::hash::{derive_user_id, sha3_256};
use sealpost_crypto::keys::{generate_key_pair, PrivateKey};
use sealpost_crypto::password::{hash_password, verify_password, Argon2Params};
use sealpost_types::{PasswordDigest, PublicKey, Result, SealpostError, UserId, UserIdentity};
use serde::{Deserialize, Serialize};
use sled::transaction::{abort, ConflictableTransactionResult};
use sled::Transactional;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::encrypted_tree::EncryptedTree;
use crate::engine::{map_transaction_error, StorageEngine, TREE_EMAILS, TREE_PRIVATE_KEYS, TREE_USERS};

// ---------------------------------------------------------------------------
// Authenticated
// ---------------------------------------------------------------------------

/// Proof that a caller presented valid credentials.
///
/// Only [`IdentityStore::authenticate`] creates one, and it is the only
/// way to read a private key back out of the store.
pub struct Authenticated {
    identity: UserIdentity,
}

impl Authenticated {
    /// The authenticated user.
    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    /// Shorthand for `identity().id`.
    pub fn user_id(&self) -> &UserId {
        &self.identity.id
    }

    /// Drops the proof and keeps the identity.
    pub fn into_identity(self) -> UserIdentity {
        self.identity
    }
}

// Authenticated does not implement Clone so a proof cannot outlive its
// owner's intent.

/// Private scalar as persisted in the `private_keys` tree.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct StoredPrivateKey {
    scalar: [u8; 32],
}

// ---------------------------------------------------------------------------
// IdentityStore
// ---------------------------------------------------------------------------

/// Registered users and their key material.
pub struct IdentityStore<'a> {
    users: EncryptedTree<'a, UserIdentity>,
    emails: sled::Tree,
    private_keys: EncryptedTree<'a, StoredPrivateKey>,
}

impl<'a> IdentityStore<'a> {
    /// Creates a new `IdentityStore` backed by the engine.
    pub(crate) fn new(engine: &'a StorageEngine) -> Result<Self> {
        Ok(Self {
            users: EncryptedTree::new(engine.open_tree(TREE_USERS)?, engine.keys()),
            emails: engine.open_tree(TREE_EMAILS)?,
            private_keys: EncryptedTree::new(engine.open_tree(TREE_PRIVATE_KEYS)?, engine.keys()),
        })
    }

    /// Registers a new user.
    ///
    /// Derives the id from `(username, email)`, hashes the password with
    /// a fresh salt and generates a long-term key pair. The private key
    /// is sealed in the `private_keys` tree and never returned.
    ///
    /// # Errors
    ///
    /// - [`SealpostError::InvalidInput`] if any argument is blank.
    /// - [`SealpostError::DuplicateUser`] if the derived id or the email
    ///   is already registered. Nothing is overwritten.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        params: &Argon2Params,
    ) -> Result<UserIdentity> {
        require_non_blank("username", username)?;
        require_non_blank("email", email)?;
        require_non_blank("password", password)?;

        let id = derive_user_id(username, email);
        let email_key = sha3_256(email.as_bytes());

        // Cheap pre-check so a duplicate does not pay for Argon2. The
        // transaction below is still authoritative.
        if self.users.contains_key(id.as_ref())? {
            return Err(duplicate_id(&id));
        }

        let password_hash = hash_password(password.as_bytes(), params)?;
        let key_pair = generate_key_pair();
        let identity = UserIdentity {
            id,
            username: username.to_owned(),
            email: email.to_owned(),
            password_hash,
            public_key: key_pair.public,
        };

        let sealed_identity = self.users.seal(id.as_ref(), &identity)?;
        let sealed_private = self.private_keys.seal(
            id.as_ref(),
            &StoredPrivateKey {
                scalar: *key_pair.private.to_bytes(),
            },
        )?;

        (self.users.tree(), &self.emails, self.private_keys.tree())
            .transaction(
                |(users, emails, private_keys)| -> ConflictableTransactionResult<(), SealpostError> {
                    if users.get(id.as_ref())?.is_some() {
                        return abort(duplicate_id(&id));
                    }
                    if emails.get(email_key.as_slice())?.is_some() {
                        return abort(SealpostError::DuplicateUser {
                            reason: "email already registered".into(),
                        });
                    }
                    users.insert(id.as_ref(), sealed_identity.as_slice())?;
                    emails.insert(email_key.as_slice(), id.as_ref())?;
                    private_keys.insert(id.as_ref(), sealed_private.as_slice())?;
                    Ok(())
                },
            )
            .map_err(map_transaction_error)?;

        tracing::info!(user_id = %identity.id, "user registered");
        Ok(identity)
    }

    /// Looks up a user by id.
    ///
    /// # Errors
    ///
    /// [`SealpostError::NotFound`] if no user has this id.
    pub fn get_user(&self, id: &UserId) -> Result<UserIdentity> {
        self.users
            .get(id.as_ref())?
            .ok_or_else(|| SealpostError::NotFound {
                reason: format!("user {id}"),
            })
    }

    /// Returns a user's long-term public key.
    pub fn public_key(&self, id: &UserId) -> Result<PublicKey> {
        Ok(self.get_user(id)?.public_key)
    }

    /// Checks a login attempt and returns the matching identity.
    ///
    /// # Errors
    ///
    /// [`SealpostError::InvalidCredentials`] for an unknown email or a
    /// wrong password alike.
    pub fn verify_login(
        &self,
        email: &str,
        password: &str,
        params: &Argon2Params,
    ) -> Result<UserIdentity> {
        self.authenticate(email, password, params)
            .map(Authenticated::into_identity)
    }

    /// Same as [`verify_login`](Self::verify_login), returning a proof
    /// that unlocks [`private_key`](Self::private_key).
    pub fn authenticate(
        &self,
        email: &str,
        password: &str,
        params: &Argon2Params,
    ) -> Result<Authenticated> {
        let email_key = sha3_256(email.as_bytes());
        let indexed = self
            .emails
            .get(email_key)
            .map_err(|e| SealpostError::StorageError {
                reason: format!("sled get failed: {e}"),
            })?;

        let Some(raw_id) = indexed else {
            // Same Argon2 work as a wrong password.
            verify_password(password.as_bytes(), &unknown_user_digest(), params)?;
            tracing::debug!("login rejected: unknown email");
            return Err(SealpostError::InvalidCredentials);
        };
        let id = UserId::new(to_id_bytes(&raw_id)?);
        let identity = self.get_user(&id).map_err(|e| match e {
            SealpostError::NotFound { .. } => SealpostError::StorageError {
                reason: format!("email index points at missing user {id}"),
            },
            other => other,
        })?;

        if !verify_password(password.as_bytes(), &identity.password_hash, params)? {
            tracing::debug!(user_id = %id, "login rejected: wrong password");
            return Err(SealpostError::InvalidCredentials);
        }

        tracing::info!(user_id = %id, "user authenticated");
        Ok(Authenticated { identity })
    }

    /// Loads the private key of an authenticated user.
    ///
    /// # Errors
    ///
    /// [`SealpostError::NotFound`] if the key record is missing.
    pub fn private_key(&self, proof: &Authenticated) -> Result<PrivateKey> {
        let id = proof.user_id();
        let stored = self
            .private_keys
            .get(id.as_ref())?
            .ok_or_else(|| SealpostError::NotFound {
                reason: format!("private key for user {id}"),
            })?;
        Ok(PrivateKey::from_bytes(stored.scalar))
    }

    /// Number of registered users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

fn require_non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SealpostError::InvalidInput {
            reason: format!("{field} must not be empty"),
        });
    }
    Ok(())
}

fn duplicate_id(id: &UserId) -> SealpostError {
    SealpostError::DuplicateUser {
        reason: format!("user id {id} already registered"),
    }
}

fn to_id_bytes(raw: &[u8]) -> Result<[u8; 32]> {
    <[u8; 32]>::try_from(raw).map_err(|_| SealpostError::StorageError {
        reason: format!("corrupt index entry: expected 32-byte id, got {}", raw.len()),
    })
}

/// Stand-in digest checked when the email is not registered.
fn unknown_user_digest() -> PasswordDigest {
    PasswordDigest {
        salt: [0x5A; 16],
        hash: [0; 32],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
