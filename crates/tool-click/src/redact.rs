/// Scheme, host and path only; query strings carry session tokens on the booking site.
pub fn url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(parsed) => format!(
            "{}://{}{}",
            parsed.scheme(),
            parsed.host_str().unwrap_or(""),
            parsed.path()
        ),
        Err(_) => raw.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}
