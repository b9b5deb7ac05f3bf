use tracing::{info, warn};

use crate::{
    auth::{
        jwt::JwtKeys,
        password::{check_strength, hash_password, is_valid_email, normalize_email, verify_password},
    },
    error::{AppError, AppResult},
    mailer::reset_link,
    state::AppState,
    users::{
        dto::{RegisterRequest, UpdateUserRequest},
        repo_types::{NewUser, Role, User, UserChanges},
    },
};

const BAD_CREDENTIALS: &str = "Invalid username or password";

fn required(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn validated_email(raw: &str) -> AppResult<String> {
    let email = normalize_email(raw);
    if email.is_empty() {
        return Err(AppError::validation("Email is required"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email"));
    }
    Ok(email)
}

async fn existing_user(st: &AppState, username: &str) -> AppResult<User> {
    st.users
        .find_by_username(username)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {username} not found")))
}

pub async fn list(st: &AppState) -> AppResult<Vec<User>> {
    st.users.list().await
}

pub async fn get_by_email(st: &AppState, email: &str) -> AppResult<User> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::validation("Email is required"));
    }
    st.users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User with email {email} not found")))
}

pub async fn get_by_username(st: &AppState, username: &str) -> AppResult<User> {
    let username = required(username, "Username")?;
    existing_user(st, &username).await
}

pub async fn register(st: &AppState, req: RegisterRequest) -> AppResult<User> {
    let username = required(&req.username, "Username")?;
    let first_name = required(&req.first_name, "First name")?;
    let last_name = required(&req.last_name, "Last name")?;
    let email = validated_email(&req.email)?;
    check_strength(&req.password)?;

    if st.users.find_by_username(&username).await?.is_some() {
        warn!(%username, "username already registered");
        return Err(AppError::Conflict("Username is already taken".into()));
    }
    if st.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict("Email is already registered".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let user = st
        .users
        .create(NewUser {
            username,
            first_name,
            last_name,
            email,
            password_hash,
            role: req.role.unwrap_or_default(),
        })
        .await?;

    info!(user_id = %user.id, username = %user.username, role = %user.role, "user registered");
    Ok(user)
}

/// Checks credentials and returns a signed session token with the user's role.
pub async fn authenticate(st: &AppState, username: &str, password: &str) -> AppResult<(String, Role)> {
    let username = username.trim();
    let Some(user) = st.users.find_by_username(username).await? else {
        warn!(%username, "login unknown username");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(%username, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
    }

    let token = JwtKeys::new(&st.config.jwt).sign_session(&user.username, user.role)?;
    info!(user_id = %user.id, %username, "user logged in");
    Ok((token, user.role))
}

pub async fn change_password(
    st: &AppState,
    username: &str,
    current_password: &str,
    new_password: &str,
) -> AppResult<()> {
    let user = existing_user(st, username).await?;
    if !verify_password(current_password, &user.password_hash)? {
        warn!(%username, "change password with wrong current password");
        return Err(AppError::Unauthorized("Current password is incorrect".into()));
    }
    check_strength(new_password)?;

    let changes = UserChanges {
        password_hash: Some(hash_password(new_password)?),
        ..Default::default()
    };
    st.users
        .update(username, &changes)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {username} not found")))?;
    info!(%username, "password changed");
    Ok(())
}

pub async fn request_password_reset(st: &AppState, email: &str) -> AppResult<()> {
    let user = get_by_email(st, email).await?;
    let token = JwtKeys::new(&st.config.jwt).sign_reset(&user.username)?;
    let link = reset_link(&st.config.mail.reset_url_base, &token);
    st.mailer.send_password_reset(&user.email, &link).await?;
    info!(username = %user.username, "password reset requested");
    Ok(())
}

pub async fn reset_password(st: &AppState, token: &str, new_password: &str) -> AppResult<()> {
    if token.trim().is_empty() {
        return Err(AppError::Unauthorized("Reset token is missing".into()));
    }
    let claims = JwtKeys::new(&st.config.jwt)
        .verify_reset(token.trim())
        .map_err(|e| {
            warn!(error = %e, "rejected reset token");
            AppError::Unauthorized("Reset token is invalid or expired".into())
        })?;
    check_strength(new_password)?;

    let changes = UserChanges {
        password_hash: Some(hash_password(new_password)?),
        ..Default::default()
    };
    st.users
        .update(&claims.sub, &changes)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {} not found", claims.sub)))?;
    info!(username = %claims.sub, "password reset");
    Ok(())
}

pub async fn update(st: &AppState, req: UpdateUserRequest) -> AppResult<User> {
    let username = required(&req.username, "Username")?;
    let current = existing_user(st, &username).await?;

    let mut changes = UserChanges {
        role: req.role,
        ..Default::default()
    };
    if let Some(v) = &req.first_name {
        changes.first_name = Some(required(v, "First name")?);
    }
    if let Some(v) = &req.last_name {
        changes.last_name = Some(required(v, "Last name")?);
    }
    if let Some(v) = &req.email {
        let email = validated_email(v)?;
        if email != current.email && st.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email is already registered".into()));
        }
        changes.email = Some(email);
    }
    if let Some(v) = &req.password {
        check_strength(v)?;
        changes.password_hash = Some(hash_password(v)?);
    }

    let user = st
        .users
        .update(&username, &changes)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {username} not found")))?;
    info!(%username, "user updated");
    Ok(user)
}

pub async fn delete(st: &AppState, username: &str) -> AppResult<()> {
    let username = required(username, "Username")?;
    if !st.users.delete(&username).await? {
        return Err(AppError::not_found(format!("User {username} not found")));
    }
    info!(%username, "user deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::tests::expired_token;
    use crate::auth::claims::TokenKind;
    use crate::state::testing::fake;

    fn register_req(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            first_name: "John".into(),
            last_name: "Doe".into(),
            email: email.into(),
            password: "Passw0rd".into(),
            role: None,
        }
    }

    #[tokio::test]
    async fn register_hashes_and_defaults_role() {
        let (st, _) = fake();
        let user = register(&st, register_req("johndoe", " John@Doe.com ")).await.unwrap();
        assert_eq!(user.email, "john@doe.com");
        assert_eq!(user.role, Role::User);
        assert_ne!(user.password_hash, "Passw0rd");
        assert!(verify_password("Passw0rd", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn register_rejects_duplicates_without_creating() {
        let (st, _) = fake();
        register(&st, register_req("johndoe", "john@doe.com")).await.unwrap();

        let same_name = register(&st, register_req("johndoe", "other@doe.com")).await;
        let same_mail = register(&st, register_req("janedoe", "JOHN@doe.com")).await;
        assert!(matches!(same_name, Err(AppError::Conflict(_))));
        assert!(matches!(same_mail, Err(AppError::Conflict(_))));
        assert_eq!(list(&st).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn register_validates_fields() {
        let (st, _) = fake();
        let mut weak = register_req("a", "a@b.io");
        weak.password = "abc".into();
        assert!(matches!(register(&st, weak).await, Err(AppError::Validation(_))));

        let bad_mail = register_req("a", "not-an-email");
        assert!(matches!(register(&st, bad_mail).await, Err(AppError::Validation(_))));

        let mut blank = register_req("a", "a@b.io");
        blank.first_name = "  ".into();
        assert!(matches!(register(&st, blank).await, Err(AppError::Validation(_))));
        assert!(list(&st).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn authenticate_issues_token_with_role() {
        let (st, _) = fake();
        let mut req = register_req("bramcelis", "bram@x.io");
        req.role = Some(Role::Admin);
        register(&st, req).await.unwrap();

        let (token, role) = authenticate(&st, "bramcelis", "Passw0rd").await.unwrap();
        assert_eq!(role, Role::Admin);
        let claims = JwtKeys::new(&st.config.jwt).verify_session(&token).unwrap();
        assert_eq!(claims.sub, "bramcelis");
        assert_eq!(claims.role, Some(Role::Admin));
    }

    #[tokio::test]
    async fn authenticate_does_not_reveal_which_field_failed() {
        let (st, _) = fake();
        register(&st, register_req("johndoe", "john@doe.com")).await.unwrap();

        let wrong_pass = authenticate(&st, "johndoe", "Wr0ngpass").await.unwrap_err();
        let no_user = authenticate(&st, "nobody", "Passw0rd").await.unwrap_err();
        assert!(matches!(wrong_pass, AppError::Unauthorized(_)));
        assert_eq!(wrong_pass.to_string(), no_user.to_string());
    }

    #[tokio::test]
    async fn change_password_requires_current_and_strength() {
        let (st, _) = fake();
        register(&st, register_req("johndoe", "john@doe.com")).await.unwrap();

        let wrong = change_password(&st, "johndoe", "Nope1234", "N3wPassword").await;
        assert!(matches!(wrong, Err(AppError::Unauthorized(_))));
        let weak = change_password(&st, "johndoe", "Passw0rd", "abc").await;
        assert!(matches!(weak, Err(AppError::Validation(_))));

        change_password(&st, "johndoe", "Passw0rd", "N3wPassword").await.unwrap();
        assert!(authenticate(&st, "johndoe", "N3wPassword").await.is_ok());
        assert!(authenticate(&st, "johndoe", "Passw0rd").await.is_err());
    }

    /// Finds users normally but loses them before any write lands.
    struct VanishingUsers(std::sync::Arc<dyn crate::users::repo::UserRepo>);

    #[async_trait::async_trait]
    impl crate::users::repo::UserRepo for VanishingUsers {
        async fn list(&self) -> AppResult<Vec<User>> {
            self.0.list().await
        }
        async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
            self.0.find_by_username(username).await
        }
        async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
            self.0.find_by_email(email).await
        }
        async fn create(&self, new: NewUser) -> AppResult<User> {
            self.0.create(new).await
        }
        async fn update(&self, _: &str, _: &UserChanges) -> AppResult<Option<User>> {
            Ok(None)
        }
        async fn delete(&self, _: &str) -> AppResult<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn change_password_for_user_deleted_midway_is_not_found() {
        let (mut st, _) = fake();
        register(&st, register_req("johndoe", "john@doe.com")).await.unwrap();
        st.users = std::sync::Arc::new(VanishingUsers(st.users.clone()));

        let res = change_password(&st, "johndoe", "Passw0rd", "N3wPassword").await;
        assert!(matches!(res, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn reset_flow_mails_link_and_updates_hash() {
        let (st, mailer) = fake();
        register(&st, register_req("johndoe", "john@doe.com")).await.unwrap();

        let unknown = request_password_reset(&st, "ghost@doe.com").await;
        assert!(matches!(unknown, Err(AppError::NotFound(_))));

        request_password_reset(&st, "john@doe.com").await.unwrap();
        let sent = mailer.sent.lock().await.clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "john@doe.com");
        let token = sent[0].1.split("token=").nth(1).unwrap().to_string();

        let weak = reset_password(&st, &token, "abc").await;
        assert!(matches!(weak, Err(AppError::Validation(_))));

        reset_password(&st, &token, "Fr3shStart").await.unwrap();
        assert!(authenticate(&st, "johndoe", "Fr3shStart").await.is_ok());
    }

    #[tokio::test]
    async fn reset_with_bad_tokens_leaves_hash_untouched() {
        let (st, _) = fake();
        register(&st, register_req("johndoe", "john@doe.com")).await.unwrap();
        let before = get_by_username(&st, "johndoe").await.unwrap().password_hash;

        let keys = JwtKeys::new(&st.config.jwt);
        let expired = expired_token(&keys, "johndoe", TokenKind::Reset);
        let session = keys.sign_session("johndoe", Role::User).unwrap();
        let mut tampered = keys.sign_reset("johndoe").unwrap();
        tampered.push('x');

        for token in ["", "garbage", expired.as_str(), session.as_str(), tampered.as_str()] {
            let res = reset_password(&st, token, "Fr3shStart").await;
            assert!(matches!(res, Err(AppError::Unauthorized(_))), "token {token:?}");
        }
        let after = get_by_username(&st, "johndoe").await.unwrap().password_hash;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn update_applies_only_given_fields() {
        let (st, _) = fake();
        register(&st, register_req("johndoe", "john@doe.com")).await.unwrap();
        register(&st, register_req("janedoe", "jane@doe.com")).await.unwrap();

        let updated = update(
            &st,
            UpdateUserRequest {
                username: "johndoe".into(),
                first_name: Some("Johnny".into()),
                last_name: None,
                email: Some("JOHNNY@doe.com".into()),
                password: None,
                role: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.first_name, "Johnny");
        assert_eq!(updated.last_name, "Doe");
        assert_eq!(updated.email, "johnny@doe.com");

        let taken = update(
            &st,
            UpdateUserRequest {
                username: "johndoe".into(),
                first_name: None,
                last_name: None,
                email: Some("jane@doe.com".into()),
                password: None,
                role: None,
            },
        )
        .await;
        assert!(matches!(taken, Err(AppError::Conflict(_))));

        let bad = update(
            &st,
            UpdateUserRequest {
                username: "johndoe".into(),
                first_name: None,
                last_name: None,
                email: Some("nope".into()),
                password: Some("abc".into()),
                role: None,
            },
        )
        .await;
        assert!(matches!(bad, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn delete_unknown_user_is_not_found() {
        let (st, _) = fake();
        let res = delete(&st, "ghost").await;
        assert!(matches!(res, Err(AppError::NotFound(_))));

        register(&st, register_req("johndoe", "john@doe.com")).await.unwrap();
        delete(&st, "johndoe").await.unwrap();
        assert!(matches!(
            get_by_username(&st, "johndoe").await,
            Err(AppError::NotFound(_))
        ));
    }
}
