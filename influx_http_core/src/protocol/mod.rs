/*!
 * Protocol layer — what we talk to and where.
 *
 * - `endpoint` — connection string parsing into base URL + database
 * - `constants` — request paths, content type, user agent
 */

pub mod constants;
pub mod endpoint;
