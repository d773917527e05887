//! OpenAPI document for the operator API.

use utoipa::OpenApi;

use super::dto::{
    BatchIngestResponse, DeadLetterListResponse, IngestRequest, PaginationMeta, PurgeResponse,
    QueueListResponse, RejectedRecord, RuleSetResponse, UpdateRuleRequest,
};
use super::handlers::{dead_letters, killmails, queues, rules, system};
use crate::delivery::DeadLetter;
use crate::domain::{
    Attacker, Clause, Destination, Location, Notification, Participant, Polarity, RateLimit,
    RawKillmail, Rule, Subject,
};
use crate::engine::RejectedRule;
use crate::error::{ErrorBody, ErrorResponse};
use crate::queue::QueueStats;
use crate::service::{IngestReport, MatchedRoute};
use crate::telemetry::MetricsSnapshot;

/// Generated OpenAPI document.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "killtracker-gateway",
        description = "Killmail filter-and-dispatch service"
    ),
    paths(
        system::health_handler,
        system::metrics_handler,
        killmails::ingest_killmails,
        queues::list_queues,
        queues::get_queue,
        queues::purge_queue,
        rules::list_rules,
        rules::reload_rules,
        rules::update_rule,
        dead_letters::list_dead_letters,
    ),
    components(schemas(
        Attacker,
        BatchIngestResponse,
        Clause,
        DeadLetter,
        DeadLetterListResponse,
        Destination,
        ErrorBody,
        ErrorResponse,
        IngestReport,
        IngestRequest,
        Location,
        MatchedRoute,
        MetricsSnapshot,
        Notification,
        PaginationMeta,
        Participant,
        Polarity,
        PurgeResponse,
        QueueListResponse,
        QueueStats,
        RateLimit,
        RawKillmail,
        RejectedRecord,
        RejectedRule,
        Rule,
        RuleSetResponse,
        Subject,
        UpdateRuleRequest,
    )),
    tags(
        (name = "System", description = "Health and metrics"),
        (name = "Killmails", description = "Killmail ingestion"),
        (name = "Queues", description = "Dispatch queues and dead letters"),
        (name = "Rules", description = "Tracker rule administration"),
    )
)]
pub struct ApiDoc;
