use actix_session::Session;

use crate::auth::context::Identity;
use crate::errors::AppError;

pub const EMAIL_KEY: &str = "email";
pub const VERIFIED_KEY: &str = "email_verified";

/// Identity stored in the cookie session by the sign-in flow, if any.
/// A session with an email but no verification flag counts as unverified.
pub fn get_identity(session: &Session) -> Result<Option<Identity>, AppError> {
    let Some(email) = session.get::<String>(EMAIL_KEY)? else {
        return Ok(None);
    };
    let verified = session.get::<bool>(VERIFIED_KEY)?.unwrap_or(false);
    Ok(Some(Identity { email, verified }))
}

/// Store the signed-in identity. Sign-in itself happens upstream.
pub fn set_identity(session: &Session, identity: &Identity) -> Result<(), AppError> {
    session.renew();
    session.insert(EMAIL_KEY, &identity.email)?;
    session.insert(VERIFIED_KEY, identity.verified)?;
    Ok(())
}
