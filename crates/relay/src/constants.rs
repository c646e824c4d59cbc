//! Wire constants, routes and user-facing messages.

// Azure DevOps service hook consumer identity
pub const CONSUMER_ID: &str = "webHooks";
pub const CONSUMER_ACTION_ID: &str = "httpRequest";

/// Azure DevOps requires `scope = 10` on input value queries.
pub const INPUT_VALUES_QUERY_SCOPE: u8 = 10;

pub const FILTER_RELEASE_DEFINITION_ID: &str = "releaseDefinitionId";
pub const FILTER_RELEASE_ENVIRONMENT_ID: &str = "releaseEnvironmentId";

// REST API versions
pub const API_VERSION: &str = "6.0";
pub const PIPELINES_API_VERSION: &str = "7.1-preview.1";
pub const WORK_ITEMS_API_VERSION: &str = "7.1-preview.3";

// Relay routes
pub const PATH_NOTIFICATION: &str = "/notification";
pub const PATH_RELEASE_APPROVAL: &str = "/pipelines/release/approve";
pub const PATH_RUN_APPROVAL: &str = "/pipelines/run/approve";

// Query parameters on service hook callback URLs
pub const QUERY_PARAM_CHANNEL_ID: &str = "channelID";
pub const QUERY_PARAM_WEBHOOK_SECRET: &str = "webhookSecret";

/// Header the chat host sets on requests from an authenticated user.
pub const HEADER_USER_ID: &str = "Mattermost-User-ID";

// Subscription listing
pub const DEFAULT_PER_PAGE: usize = 50;
pub const FILTER_CREATED_BY_ME: &str = "me";
pub const FILTER_CREATED_BY_ANYONE: &str = "anyone";
pub const FILTER_ALL_CHANNELS: &str = "all_channels";

// Events published to the webapp
pub const EVENT_DISCONNECT: &str = "disconnect";

/// How long an OAuth `state` value stays valid.
pub const OAUTH_STATE_TTL_SECS: u64 = 600;

// Generic messages
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong, please try again later";
pub const SESSION_EXPIRED_MESSAGE: &str =
    "Session expired. Please connect your Azure DevOps account again";

// Validation messages
pub const ORGANIZATION_REQUIRED: &str = "organization is required";
pub const PROJECT_REQUIRED: &str = "project is required";
pub const PROJECT_ID_REQUIRED: &str = "project ID is required";
pub const EVENT_TYPE_REQUIRED: &str = "event type is required";
pub const SERVICE_TYPE_REQUIRED: &str = "service type is required";
pub const CHANNEL_ID_REQUIRED: &str = "channel ID is required";
pub const SUBSCRIPTION_ID_REQUIRED: &str = "subscription ID is required";
pub const MM_USER_ID_REQUIRED: &str = "mattermost user ID is required";
pub const TEAM_ID_REQUIRED: &str = "team ID is required";
pub const FILTERS_REQUIRED: &str = "filters required";
pub const TASK_TYPE_REQUIRED: &str = "task type is required";
pub const TASK_TITLE_REQUIRED: &str = "task title is required";
pub const CHANNEL_ID_OR_MESSAGE_REQUIRED: &str = "channel ID and message are required";

// Subscription messages
pub const SUBSCRIPTION_ALREADY_PRESENT: &str = "Requested subscription already exists";
pub const SUBSCRIPTION_NOT_FOUND: &str = "Requested subscription does not exists";
pub const PROJECT_NOT_LINKED: &str = "Requested project is not linked";
pub const PROJECT_ALREADY_LINKED: &str = "Requested project is already linked";
pub const PROJECT_NOT_FOUND: &str = "Requested project does not exists";
pub const ERROR_ADMIN_ACCESS: &str = "Cannot delete the subscription, looks like you do not have access to add/delete a subscription for this project. Please make sure you are a project or team administrator for this project";
pub const ERROR_ADMIN_ACCESS_CREATE: &str = "Cannot create the subscription, looks like you do not have access to add/delete a subscription for this project. Please make sure you are a project or team administrator for this project";
pub const INVALID_WEBHOOK_SECRET: &str =
    "missing or invalid webhook secret for subscriptions notification";
pub const INVALID_CHANNEL_ID: &str = "missing or invalid channel ID";
pub const CHANNEL_SUBSCRIPTION_MISMATCH: &str =
    "channel ID does not match the subscription of this notification";
pub const INVALID_NOTIFICATION_BODY: &str = "invalid notification body";

// Approval messages
pub const APPROVAL_PROCESSED: &str = "Your approval/rejection request has been processed.";
pub const NOT_CONNECTED: &str = "Your Azure DevOps account is not connected";

// OAuth messages
pub const CONNECTED: &str = "Your Azure DevOps account is successfully connected!";
pub const AUTH_ATTEMPT_EXPIRED: &str = "Authentication attempt expired, please try again";
pub const INVALID_OAUTH_STATE: &str = "Invalid oauth state, please try again";
