use regex::Regex;

pub fn validate_email(email: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    re.is_match(email)
}

/// Password policy for admin registration: at least one uppercase letter,
/// one lowercase letter and one digit.
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one number");
    }
    Ok(())
}

/// Six-digit numeric one-time token, 0..=999999.
pub fn generate_otp() -> i64 {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    rng.gen_range(0..1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_email() {
        assert!(validate_email("rider@example.com"));
        assert!(!validate_email("not-an-email"));
        assert!(!validate_email("missing@tld"));
    }

    #[test]
    fn password_policy_requires_all_classes() {
        assert!(validate_password("Abc123").is_ok());
        assert!(validate_password("abc123").is_err());
        assert!(validate_password("ABC123").is_err());
        assert!(validate_password("Abcdef").is_err());
    }

    #[test]
    fn otp_stays_in_six_digit_range() {
        for _ in 0..100 {
            let t = generate_otp();
            assert!((0..1_000_000).contains(&t));
        }
    }
}
