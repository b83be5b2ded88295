//! Sender/recipient header parsing

use serde::Serialize;

/// One mailbox from a `From`/`To` header.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Address {
    /// Display name, empty when the header only carries an address.
    pub name: String,
    pub email: String,
    /// The header text this address was parsed from.
    pub full: String,
}

impl Address {
    /// Parse a single address such as `"Ivan Petrov" <ivan@mail.ru>`.
    ///
    /// The email is the bracketed text ending at the last `>`, opened by
    /// the nearest `<` before it, so a display name may itself contain
    /// brackets. Everything before that `<` is the display name
    /// (whitespace and surrounding double quotes trimmed). Without
    /// brackets the trimmed input is both `email` and `full`.
    ///
    /// ```
    /// use imapbox::Address;
    ///
    /// let addr = Address::parse("\"Ivan Petrov\" <ivan@mail.ru>");
    /// assert_eq!(addr.name, "Ivan Petrov");
    /// assert_eq!(addr.email, "ivan@mail.ru");
    ///
    /// let bare = Address::parse(" ivan@mail.ru ");
    /// assert_eq!(bare.name, "");
    /// assert_eq!(bare.full, "ivan@mail.ru");
    /// ```
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if let Some(close) = raw.rfind('>')
            && let Some(open) = raw[..close].rfind('<')
        {
            return Self {
                name: raw[..open].trim().trim_matches('"').trim().to_string(),
                email: raw[open + 1..close].trim().to_string(),
                full: raw.to_string(),
            };
        }
        let trimmed = raw.trim();
        Self {
            name: String::new(),
            email: trimmed.to_string(),
            full: trimmed.to_string(),
        }
    }
}

/// Split an address list on the commas that separate recipients.
///
/// Commas inside a quoted display name (`"Smith, John" <j@x.com>`), a
/// comment or an angle-bracket address do not split.
#[must_use]
pub fn split_addresses(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    let mut angle = 0u32;
    let mut comment = 0u32;

    for (i, c) in list.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' if comment == 0 => quoted = !quoted,
            '<' if !quoted && comment == 0 => angle += 1,
            '>' if !quoted && comment == 0 => angle = angle.saturating_sub(1),
            '(' if !quoted => comment += 1,
            ')' if !quoted => comment = comment.saturating_sub(1),
            ',' if !quoted && angle == 0 && comment == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);
    parts
}

/// Parse every non-blank entry of an address list.
#[must_use]
pub fn parse_list(list: &str) -> Vec<Address> {
    split_addresses(list)
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .map(Address::parse)
        .collect()
}
