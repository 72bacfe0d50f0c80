/**
 * Connection string parsing.
 *
 * A transport is configured with a single string such as
 * `http://localhost:8086/?db=metrics`. Everything before the `?` is the
 * server base URL; the `db` query parameter names the target database.
 *
 * The flow:
 * 1. Split on the first `?`. Without one there is no database to target.
 * 2. Strip one `/` sitting directly before the `?`.
 * 3. Check that what remains is an absolute `http`/`https` URL.
 * 4. Pull `db` out of the query string. Every other parameter is ignored.
 */
use url::Url;

use crate::error::{Error, Result};

const NO_DATABASE: &str = "no database specified";

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/**
 * Parsed connection target. Immutable once built.
 *
 * Invariants:
 * - `base_url` carries no query string and no trailing `/` from just
 *   before the query marker.
 * - `database` is non-empty.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    database: String,
}

impl Endpoint {
    /**
     * Parses a connection string into an `Endpoint`.
     *
     * # Returns
     * * `Ok(Endpoint)` for strings like `scheme://host[:port][/path][/]?db=NAME`.
     * * `Err(Error::Configuration)` when there is no query string, no
     *   non-empty `db` parameter, or the base part is not an http(s) URL.
     *
     * # Example
     * ```ignore
     * let endpoint = Endpoint::parse("http://localhost:8086/?db=mydb")?;
     * assert_eq!(endpoint.base_url(), "http://localhost:8086");
     * assert_eq!(endpoint.database(), "mydb");
     * ```
     */
    pub fn parse(url: &str) -> Result<Self> {
        let Some((base, query)) = url.split_once('?') else {
            return Err(Error::configuration(NO_DATABASE));
        };

        let base = base.strip_suffix('/').unwrap_or(base);
        validate_base(base)?;

        let database = url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "db")
            .map(|(_, value)| value.into_owned())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::configuration(NO_DATABASE))?;

        Ok(Self {
            base_url: base.to_string(),
            database,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Full URL for a server path such as `/write`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn validate_base(base: &str) -> Result<()> {
    let parsed = Url::parse(base)
        .map_err(|e| Error::configuration(format!("malformed endpoint url '{base}': {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::configuration(format!(
            "unsupported endpoint scheme '{other}'"
        ))),
    }
}
