use serde::Serialize;

pub const UNKNOWN_AUTHOR: &str = "Unknown";
const UNKNOWN_INITIALS: &str = "U";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

impl UserProfile {
    pub fn identity(&self) -> DisplayIdentity {
        display_identity(
            self.first_name.as_deref(),
            self.last_name.as_deref(),
            self.username.as_deref(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayIdentity {
    pub name: String,
    pub initials: String,
}

impl Default for DisplayIdentity {
    fn default() -> Self {
        Self {
            name: UNKNOWN_AUTHOR.to_string(),
            initials: UNKNOWN_INITIALS.to_string(),
        }
    }
}

/// Family name first: `{last} {first}`. Blank fields count as missing.
pub fn display_identity(
    first_name: Option<&str>,
    last_name: Option<&str>,
    username: Option<&str>,
) -> DisplayIdentity {
    let first = non_blank(first_name);
    let last = non_blank(last_name);
    match (first, last) {
        (Some(first), Some(last)) => DisplayIdentity {
            name: format!("{last} {first}").trim().to_string(),
            initials: format!("{}{}", initial(last), initial(first)),
        },
        (Some(only), None) | (None, Some(only)) => DisplayIdentity {
            name: only.to_string(),
            initials: initial(only),
        },
        (None, None) => {
            let name = non_blank(username).unwrap_or(UNKNOWN_AUTHOR);
            let initials = if name == UNKNOWN_AUTHOR {
                UNKNOWN_INITIALS.to_string()
            } else {
                initial(name)
            };
            DisplayIdentity {
                name: name.to_string(),
                initials,
            }
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn initial(value: &str) -> String {
    value
        .chars()
        .next()
        .map(|ch| ch.to_uppercase().collect())
        .unwrap_or_else(|| UNKNOWN_INITIALS.to_string())
}
