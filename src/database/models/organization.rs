use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lowercase the name, collapse whitespace runs to hyphens, strip everything
/// outside [a-z0-9-]. Mirrors how organizations are slugged at registration.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_space = false;
    for c in name.to_lowercase().chars() {
        if c.is_whitespace() {
            if !last_was_space {
                slug.push('-');
                last_was_space = true;
            }
        } else if c.is_ascii_alphanumeric() || c == '-' {
            slug.push(c);
            last_was_space = false;
        }
    }
    slug.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_and_strips() {
        assert_eq!(slugify("Inmobiliaria  Del Sur"), "inmobiliaria-del-sur");
        assert_eq!(slugify("ACME S.A."), "acme-sa");
        assert_eq!(slugify("  spaced  "), "spaced");
    }
}
