//! Account commands.

use std::io::{self, BufRead, Write};

use shopez_storefront::error::{AppError, add_breadcrumb};

use super::storefront;

/// Create an account and sign in.
pub async fn signup(email: &str, password: Option<String>) -> Result<(), AppError> {
    let password = read_password(password)?;
    let (storefront, _) = storefront().await?;

    let user = storefront.auth().sign_up(email, &password).await?;
    add_breadcrumb("auth", "Signed up", None);

    println!("Account created. Signed in as {email} ({user})");
    Ok(())
}

/// Sign in with email and password.
pub async fn login(email: &str, password: Option<String>) -> Result<(), AppError> {
    let password = read_password(password)?;
    let (storefront, _) = storefront().await?;

    let user = storefront.auth().sign_in(email, &password).await?;
    add_breadcrumb("auth", "Signed in", None);

    println!("Signed in as {email} ({user})");
    Ok(())
}

/// Sign out and forget the saved session.
pub async fn logout() -> Result<(), AppError> {
    let (storefront, user) = storefront().await?;
    if user.is_none() {
        println!("Not signed in");
        return Ok(());
    }

    storefront.auth().sign_out().await;
    println!("Signed out");
    Ok(())
}

/// Show the signed-in account.
pub async fn whoami() -> Result<(), AppError> {
    let (storefront, _) = storefront().await?;

    match storefront.auth().session().await {
        Some(session) => println!("{} ({})", session.email, session.user_id),
        None => println!("Not signed in"),
    }
    Ok(())
}

/// Use the flag if given, otherwise read one line from stdin.
fn read_password(flag: Option<String>) -> Result<String, AppError> {
    if let Some(password) = flag {
        return Ok(password);
    }

    print!("Password: ");
    io::stdout()
        .flush()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(AppError::BadRequest("Password is required".to_string()));
    }
    Ok(password)
}
