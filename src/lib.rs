/*!
# Picknik Forms

Backend for the venue website's contact and lead form. One endpoint takes a
form submission, writes it as a new row in a Google Sheet and emails staff.

## Architecture

The relay is a single linear pipeline behind a small HTTP surface:

### HTTP layer
- **Technologies**: Rust, axum, tower-http
- **Components**:
  - Origin guard - Rejects browser requests from origins outside the allow-list
  - CORS - `POST` and `Content-Type` only, for allowed origins
  - Rate limiter - Fixed window, 100 requests per 15 minutes per client
  - Security headers - nosniff, frame and referrer policies

### Submission pipeline
- Form Validator - Checks the five fields, reporting every violation
- ID Allocator - Reads the sheet's last row and issues the next 4-digit ID
- Sheet Appender - Appends the ten-column row (`USER_ENTERED`)
- Notifier - Queues an email that a background task delivers

### Persistence
- Google Sheets API v4 with service-account (JWT bearer) credentials
- In-memory sheet for local development

## Modules

- **config**: Environment-driven settings
- **error**: Error types and their HTTP mapping
- **submission**: Submission entity and row layout
- **validator**: Form validation
- **allocator**: Sequential ID allocation
- **google_auth**: Service-account access tokens
- **sheets**: Backing store trait, Google Sheets client, in-memory sheet
- **mailer**: Email notifications and the notification queue
- **relay**: The submission pipeline
- **rate_limit**: Fixed-window rate limiting middleware
- **cors**: Origin allow-list and CORS layer
- **app**: Routing, handlers and server startup

## REST API Endpoints

- `POST /api/submit-form` - Validates and stores a submission, returns its ID
- `GET /api/health` - Reports the configured store and notification status
*/

pub mod allocator;
pub mod app;
pub mod config;
pub mod cors;
pub mod error;
pub mod google_auth;
pub mod mailer;
pub mod rate_limit;
pub mod relay;
pub mod sheets;
pub mod submission;
pub mod validator;

pub use config::{Config, ConfigError};
pub use error::{AllocError, NotifyError, StoreError, SubmitError};
pub use relay::SubmissionService;
pub use submission::{Submission, SubmissionForm, SubmissionId};
