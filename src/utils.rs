// src/utils.rs

/// Check if a string is a valid domain
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }

    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() < 2 {
        return false;
    }

    for part in parts {
        if part.is_empty() || part.len() > 63 {
            return false;
        }

        if !part.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
            return false;
        }

        if part.starts_with('-') || part.ends_with('-') {
            return false;
        }
    }

    true
}

/// Turns a provider label such as `www` into `www.example.com`.
///
/// Labels that already carry the domain are returned unchanged.
pub fn qualify_label(label: &str, domain: &str) -> String {
    let label = label.trim_end_matches('.');
    if label == domain || label.ends_with(&format!(".{}", domain)) {
        label.to_string()
    } else {
        format!("{}.{}", label, domain)
    }
}

/// Renders an IP set as `[a, b]`.
pub fn format_ip_list(ips: &[String]) -> String {
    format!("[{}]", ips.join(", "))
}
