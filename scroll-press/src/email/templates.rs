// SPDX-License-Identifier: AGPL-3.0-or-later

//! Outbound email content as pure functions returning `(html, text)` pairs.
//!
//! No template engine involved, the bodies are small and fixed enough that plain formatting
//! keeps them unit-testable without any rendering context.

/// Email verification message sent right after registration and on re-request.
pub fn verification_email(name: &str, token: &str, base_url: &str) -> (String, String) {
    let link = format!("{}/verify-email?token={}", base_url, token);

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: sans-serif; line-height: 1.6; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1>Welcome to Scroll Press!</h1>
    <p>Hi {name},</p>
    <p>Thanks for joining Scroll Press! Please verify your email address to start uploading and sharing your research manuscripts.</p>
    <p><a href="{link}">Verify Email Address</a></p>
    <p>Or copy and paste this link into your browser:<br>{link}</p>
    <p>If you didn't create an account with Scroll Press, you can safely ignore this email.</p>
</body>
</html>"#,
        name = name,
        link = link,
    );

    let text = format!(
        "Welcome to Scroll Press!\n\n\
         Hi {name},\n\n\
         Thanks for joining Scroll Press! Please verify your email address to start uploading \
         and sharing your research manuscripts.\n\n\
         Verify your email by clicking this link:\n{link}\n\n\
         If you didn't create an account with Scroll Press, you can safely ignore this email.\n",
        name = name,
        link = link,
    );

    (html, text)
}

/// Password reset message with a short-lived single-use link.
pub fn password_reset_email(name: &str, token: &str, base_url: &str) -> (String, String) {
    let link = format!("{}/reset-password?token={}", base_url, token);

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: sans-serif; line-height: 1.6; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1>Reset your Scroll Press password</h1>
    <p>Hi {name},</p>
    <p>We received a request to reset your password. The link below is valid for one hour and can be used once.</p>
    <p><a href="{link}">Reset Password</a></p>
    <p>Or copy and paste this link into your browser:<br>{link}</p>
    <p>If you didn't request a password reset, you can safely ignore this email.</p>
</body>
</html>"#,
        name = name,
        link = link,
    );

    let text = format!(
        "Reset your Scroll Press password\n\n\
         Hi {name},\n\n\
         We received a request to reset your password. The link below is valid for one hour and \
         can be used once.\n\n{link}\n\n\
         If you didn't request a password reset, you can safely ignore this email.\n",
        name = name,
        link = link,
    );

    (html, text)
}

/// Notification to the admin address about a new signup.
pub fn admin_signup_notification(
    email: &str,
    display_name: &str,
    user_id: &str,
) -> (String, String) {
    let html = format!(
        "<html><body><h2>New Scroll Press signup</h2>\
         <p><strong>Name:</strong> {display_name}</p>\
         <p><strong>Email:</strong> {email}</p>\
         <p><strong>User ID:</strong> {user_id}</p></body></html>",
        display_name = display_name,
        email = email,
        user_id = user_id,
    );

    let text = format!(
        "New Scroll Press signup\n\nName: {}\nEmail: {}\nUser ID: {}\n",
        display_name, email, user_id
    );

    (html, text)
}

/// Notification to the admin address about a freshly published scroll.
pub fn admin_publish_notification(
    email: &str,
    display_name: &str,
    title: &str,
    url: &str,
    url_hash: &str,
) -> (String, String) {
    let html = format!(
        "<html><body><h2>New publication on Scroll Press</h2>\
         <p><strong>Title:</strong> {title}</p>\
         <p><strong>Author account:</strong> {display_name} ({email})</p>\
         <p><strong>URL:</strong> <a href=\"{url}\">{url}</a></p>\
         <p><strong>Hash:</strong> {url_hash}</p></body></html>",
        title = title,
        display_name = display_name,
        email = email,
        url = url,
        url_hash = url_hash,
    );

    let text = format!(
        "New publication on Scroll Press\n\nTitle: {}\nAuthor account: {} ({})\nURL: {}\nHash: {}\n",
        title, display_name, email, url, url_hash
    );

    (html, text)
}

#[cfg(test)]
mod tests {
    use super::{password_reset_email, verification_email};

    #[test]
    fn verification_email_embeds_the_token_link() {
        let (html, text) = verification_email("Ada", "tok123", "https://scroll.press");

        let link = "https://scroll.press/verify-email?token=tok123";
        assert!(html.contains(link));
        assert!(text.contains(link));
        assert!(html.contains("Ada"));
    }

    #[test]
    fn reset_email_embeds_the_token_link() {
        let (html, text) = password_reset_email("Ada", "tok456", "https://scroll.press");

        let link = "https://scroll.press/reset-password?token=tok456";
        assert!(html.contains(link));
        assert!(text.contains(link));

        // Reset and verification links must never be interchangeable
        assert!(!html.contains("verify-email"));
    }
}
