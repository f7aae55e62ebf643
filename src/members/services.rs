use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::images::services::{discard_image, store_image, StoredImage, UploadItem};
use crate::members::dto::MemberForm;
use crate::members::repo::is_unique_violation;
use crate::members::repo_types::{Member, NewMember, Role};
use crate::state::AppState;

const PROFILE_FOLDER: &str = "profiles";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trims the form in place and rejects values the schema would not accept.
fn validate(form: &mut MemberForm) -> AppResult<()> {
    form.email = normalize_email(&form.email);
    form.nickname = form.nickname.trim().to_string();
    form.name = form.name.trim().to_string();

    if !is_valid_email(&form.email) {
        warn!(email = %form.email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    if form.nickname.is_empty() {
        return Err(AppError::BadRequest("Nickname is required".into()));
    }
    if form.name.is_empty() {
        return Err(AppError::BadRequest("Name is required".into()));
    }
    for (field, v) in [("height", form.height), ("weight", form.weight)] {
        if !v.is_finite() || v <= 0.0 {
            return Err(AppError::BadRequest(format!("Invalid {field}")));
        }
    }
    Ok(())
}

fn conflict_from(e: anyhow::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict("Email or nickname already in use".into())
    } else {
        AppError::Internal(e)
    }
}

async fn store_profile_image(
    st: &AppState,
    image: Option<UploadItem>,
) -> AppResult<Option<StoredImage>> {
    match image {
        Some(item) if !item.is_empty() => {
            Ok(Some(store_image(st.storage.as_ref(), PROFILE_FOLDER, item).await?))
        }
        _ => Ok(None),
    }
}

/// Drops a freshly stored image when the write that should reference it failed.
async fn undo_image<T>(
    st: &AppState,
    image: Option<&StoredImage>,
    res: AppResult<T>,
) -> AppResult<T> {
    if let (Err(_), Some(img)) = (&res, image) {
        discard_image(st.storage.as_ref(), img).await;
    }
    res
}

async fn find(st: &AppState, id: i64) -> AppResult<Member> {
    st.members
        .find_by_id(id)
        .await?
        .ok_or_else(AppError::member_not_found)
}

async fn save(st: &AppState, member: &Member) -> AppResult<Member> {
    st.members
        .update(member)
        .await
        .map_err(conflict_from)?
        .ok_or_else(AppError::member_not_found)
}

#[instrument(skip(st, form, image), fields(email = %form.email, nickname = %form.nickname))]
pub async fn register(
    st: &AppState,
    mut form: MemberForm,
    image: Option<UploadItem>,
) -> AppResult<Member> {
    validate(&mut form)?;

    if st.members.exists_by_email(&form.email).await? {
        warn!(email = %form.email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }
    if st.members.exists_by_nickname(&form.nickname).await? {
        warn!(nickname = %form.nickname, "nickname already taken");
        return Err(AppError::Conflict("Nickname already taken".into()));
    }

    let password = match form.password.as_deref() {
        Some(p) if !p.is_empty() => p,
        _ => return Err(AppError::BadRequest("Password is required".into())),
    };
    let password_hash = st.credentials.hash(password)?;

    let stored = store_profile_image(st, image).await?;

    let res = st
        .members
        .insert(NewMember {
            email: form.email,
            nickname: form.nickname,
            password_hash,
            name: form.name,
            birth_at: form.birth_at,
            gender: form.gender,
            height: form.height,
            weight: form.weight,
            activity_level: form.activity_level,
            profile_image_url: stored.as_ref().map(|img| img.url.clone()),
            role: Role::default(),
        })
        .await
        .map_err(conflict_from);
    let member = undo_image(st, stored.as_ref(), res).await?;

    info!(member_id = member.id, "member registered");
    Ok(member)
}

pub async fn get(st: &AppState, id: i64) -> AppResult<Member> {
    find(st, id).await
}

pub async fn get_by_email(st: &AppState, email: &str) -> AppResult<Member> {
    st.members
        .find_by_email(&normalize_email(email))
        .await?
        .ok_or_else(AppError::member_not_found)
}

pub async fn get_by_nickname(st: &AppState, nickname: &str) -> AppResult<Member> {
    st.members
        .find_by_nickname(nickname)
        .await?
        .ok_or_else(AppError::member_not_found)
}

#[instrument(skip(st, password))]
pub async fn authenticate(st: &AppState, nickname: &str, password: &str) -> AppResult<Member> {
    let member = match st.members.find_by_nickname(nickname).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            warn!(%nickname, "login unknown nickname");
            return Err(AppError::member_not_found());
        }
        Err(e) => {
            error!(error = %e, "find_by_nickname failed");
            return Err(e.into());
        }
    };

    let ok = st
        .credentials
        .verify(&member.password_hash, password)
        .map_err(|e| {
            error!(error = %e, member_id = member.id, "credential verification failed");
            e
        })?;
    if !ok {
        warn!(member_id = member.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid password".into()));
    }

    info!(member_id = member.id, "member logged in");
    Ok(member)
}

/// Replaces the profile wholesale; the image and password are kept unless new ones are given.
#[instrument(skip(st, form, image))]
pub async fn update_profile(
    st: &AppState,
    id: i64,
    mut form: MemberForm,
    image: Option<UploadItem>,
) -> AppResult<Member> {
    let current = find(st, id).await?;
    validate(&mut form)?;

    if current.email != form.email && st.members.exists_by_email(&form.email).await? {
        warn!(email = %form.email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }
    if current.nickname != form.nickname && st.members.exists_by_nickname(&form.nickname).await? {
        warn!(nickname = %form.nickname, "nickname already taken");
        return Err(AppError::Conflict("Nickname already taken".into()));
    }

    let password_hash = match form.password.as_deref() {
        Some(p) if !p.is_empty() => st.credentials.hash(p)?,
        _ => current.password_hash.clone(),
    };
    // The previous file stays on disk.
    let stored = store_profile_image(st, image).await?;
    let profile_image_url = match &stored {
        Some(img) => Some(img.url.clone()),
        None => current.profile_image_url.clone(),
    };

    let updated = Member {
        email: form.email,
        nickname: form.nickname,
        password_hash,
        name: form.name,
        birth_at: form.birth_at,
        gender: form.gender,
        height: form.height,
        weight: form.weight,
        activity_level: form.activity_level,
        profile_image_url,
        updated_at: OffsetDateTime::now_utc(),
        ..current
    };
    let saved = undo_image(st, stored.as_ref(), save(st, &updated).await).await?;
    info!(member_id = saved.id, "member updated");
    Ok(saved)
}

#[instrument(skip(st, new_password))]
pub async fn change_password(st: &AppState, id: i64, new_password: &str) -> AppResult<()> {
    let current = find(st, id).await?;
    if new_password.is_empty() {
        return Err(AppError::BadRequest("Password is required".into()));
    }
    let updated = Member {
        password_hash: st.credentials.hash(new_password)?,
        updated_at: OffsetDateTime::now_utc(),
        ..current
    };
    save(st, &updated).await?;
    info!(member_id = id, "password changed");
    Ok(())
}

#[instrument(skip(st, image))]
pub async fn replace_profile_image(st: &AppState, id: i64, image: UploadItem) -> AppResult<()> {
    let current = find(st, id).await?;
    if image.is_empty() {
        return Err(AppError::BadRequest("profileImage is empty".into()));
    }
    let stored = store_image(st.storage.as_ref(), PROFILE_FOLDER, image).await?;
    let updated = Member {
        profile_image_url: Some(stored.url.clone()),
        updated_at: OffsetDateTime::now_utc(),
        ..current
    };
    undo_image(st, Some(&stored), save(st, &updated).await).await?;
    Ok(())
}

/// Deletes the member together with their meals.
#[instrument(skip(st))]
pub async fn delete(st: &AppState, id: i64) -> AppResult<()> {
    if !st.members.delete(id).await? {
        return Err(AppError::member_not_found());
    }
    info!(member_id = id, "member deleted");
    Ok(())
}

pub async fn exists_by_email(st: &AppState, email: &str) -> AppResult<bool> {
    Ok(st.members.exists_by_email(&normalize_email(email)).await?)
}

pub async fn exists_by_nickname(st: &AppState, nickname: &str) -> AppResult<bool> {
    Ok(st.members.exists_by_nickname(nickname).await?)
}

pub async fn search(st: &AppState, query: &str) -> AppResult<Vec<Member>> {
    Ok(st.members.search(query).await?)
}
