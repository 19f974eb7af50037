use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::RwLock;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, Implementation, ListResourceTemplatesResult, ListResourcesResult,
        PaginatedRequestParams, ProtocolVersion, RawResource, RawResourceTemplate,
        ReadResourceRequestParams, ReadResourceResult, Resource, ResourceContents,
        ResourceTemplate, ServerCapabilities, ServerInfo,
    },
    schemars,
    service::RequestContext,
    tool, tool_handler, tool_router,
};

use crate::domain::booking::{BookingBasis, BookingRequest};
use crate::domain::dates::NightRange;
use crate::domain::property::GuestProfile;
use crate::domain::reservation::PartySize;
use crate::engine::StayEngine;
use crate::engine::quote::QuoteRequest;
use crate::error::StayError;

const DEFAULT_EVENT_LIMIT: u32 = 20;
const MAX_EVENT_LIMIT: u32 = 200;

// ---------- Resource Store ----------

/// Quotes, reservations and reports produced by tools, exposed as MCP
/// resources. Keys are URIs like `staysync://quote/{id}`.
#[derive(Clone, Default)]
pub struct ResourceStore {
    entries: Arc<RwLock<HashMap<String, ResourceEntry>>>,
}

#[derive(Clone)]
struct ResourceEntry {
    name: String,
    text: String,
}

impl ResourceStore {
    async fn insert(&self, uri: impl Into<String>, name: impl Into<String>, text: String) {
        self.entries.write().await.insert(
            uri.into(),
            ResourceEntry {
                name: name.into(),
                text,
            },
        );
    }

    async fn get(&self, uri: &str) -> Option<ResourceEntry> {
        self.entries.read().await.get(uri).cloned()
    }

    async fn list(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(uri, entry)| (uri.clone(), entry.name.clone()))
            .collect();
        entries.sort();
        entries
    }
}

impl std::fmt::Debug for ResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStore").finish()
    }
}

// ---------- Tool parameter types ----------

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct StayToolParams {
    /// Internal property id
    pub property_id: String,
    /// Check-in date (YYYY-MM-DD)
    pub check_in: String,
    /// Check-out date (YYYY-MM-DD), after check-in
    pub check_out: String,
    /// Number of adult guests (at least 1)
    pub adults: u32,
    /// Number of children
    pub children: Option<u32>,
    /// Number of infants (do not count toward capacity)
    pub infants: Option<u32>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct QuoteToolParams {
    #[serde(flatten)]
    pub stay: StayToolParams,
    /// Promo code, case-insensitive
    pub promo_code: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BookingToolParams {
    /// Internal property id
    pub property_id: String,
    /// Quote id from `generate_quote`. When omitted, the stay fields below
    /// are priced at booking time.
    pub quote_id: Option<String>,
    /// Check-in date (YYYY-MM-DD), required without `quote_id`
    pub check_in: Option<String>,
    /// Check-out date (YYYY-MM-DD), required without `quote_id`
    pub check_out: Option<String>,
    /// Number of adults, required without `quote_id`
    pub adults: Option<u32>,
    pub children: Option<u32>,
    pub infants: Option<u32>,
    pub promo_code: Option<String>,
    /// Guest full name
    pub guest_name: String,
    /// Guest email; identifies the guest within the organization
    pub guest_email: String,
    pub guest_phone: Option<String>,
    /// Free-form notes stored on the reservation
    pub notes: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ReservationToolParams {
    /// Internal reservation id
    pub reservation_id: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ExternalEventToolParams {
    /// Webhook body as delivered by the PMS, e.g.
    /// `{"event":"reservation.created","reservation":{...}}`
    pub event: serde_json::Value,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct IntelligenceToolParams {
    /// Internal property id
    pub property_id: String,
    /// Days from today to analyze (1-365, default from config)
    #[schemars(range(min = 1, max = 365))]
    pub window_days: Option<u32>,
    /// Requested check-in (YYYY-MM-DD) for alternative-date search
    pub check_in: Option<String>,
    /// Requested check-out (YYYY-MM-DD), paired with `check_in`
    pub check_out: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct BlockToolParams {
    /// Internal property id
    pub property_id: String,
    /// First night to block (YYYY-MM-DD)
    pub from: String,
    /// Day after the last night (YYYY-MM-DD)
    pub to: String,
    /// Shown to staff, e.g. "owner stay" or "maintenance"
    pub reason: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct EventsToolParams {
    /// Number of entries, newest first (default 20, max 200)
    pub limit: Option<u32>,
}

impl StayToolParams {
    fn range(&self) -> Result<NightRange, StayError> {
        NightRange::parse(&self.check_in, &self.check_out)
    }

    fn party(&self) -> PartySize {
        PartySize {
            adults: self.adults,
            children: self.children.unwrap_or(0),
            infants: self.infants.unwrap_or(0),
        }
    }
}

impl BookingToolParams {
    fn into_request(self) -> Result<BookingRequest, StayError> {
        let basis = match self.quote_id.filter(|id| !id.trim().is_empty()) {
            Some(quote_id) => BookingBasis::Quote { quote_id },
            None => {
                let (Some(check_in), Some(check_out), Some(adults)) =
                    (self.check_in, self.check_out, self.adults)
                else {
                    return Err(StayError::invalid(
                        "provide quote_id, or check_in, check_out and adults",
                    ));
                };
                BookingBasis::Stay {
                    range: NightRange::parse(&check_in, &check_out)?,
                    party: PartySize {
                        adults,
                        children: self.children.unwrap_or(0),
                        infants: self.infants.unwrap_or(0),
                    },
                    promo_code: self.promo_code,
                }
            }
        };
        Ok(BookingRequest {
            property_id: self.property_id,
            basis,
            guest: GuestProfile {
                name: self.guest_name,
                email: self.guest_email,
                phone: self.guest_phone,
            },
            notes: self.notes,
        })
    }
}

/// Error text with the recovery step the caller should take.
fn failure(action: &str, err: &StayError) -> CallToolResult {
    let hint = match err {
        StayError::Conflict { .. } => " Pick different dates and request a new quote.",
        StayError::QuoteExpired { .. } => " Call generate_quote again for current prices.",
        StayError::NotAvailable { .. } => {
            " Use price_intelligence with these dates to find open alternatives."
        }
        StayError::UpstreamTransient { .. } | StayError::PricingUnavailable { .. } => {
            " This is temporary; retry shortly."
        }
        _ => "",
    };
    CallToolResult::error(vec![Content::text(format!("{action} failed: {err}.{hint}"))])
}

// ---------- MCP Server ----------

#[derive(Clone)]
pub struct StaySyncMcpServer {
    engine: Arc<StayEngine>,
    tool_router: ToolRouter<Self>,
    resources: ResourceStore,
}

#[tool_router]
impl StaySyncMcpServer {
    pub fn new(engine: Arc<StayEngine>) -> Self {
        Self {
            engine,
            tool_router: Self::tool_router(),
            resources: ResourceStore::default(),
        }
    }

    #[tool(
        name = "check_availability",
        description = "Check whether a property can be booked for a stay. Combines the external PMS calendar with internal bookings and blocks; lists blocked dates and every rule the stay breaks.",
        annotations(read_only_hint = true, open_world_hint = true)
    )]
    async fn check_availability(
        &self,
        Parameters(params): Parameters<StayToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let range = match params.range() {
            Ok(range) => range,
            Err(e) => return Ok(failure("Availability check", &e)),
        };
        match self
            .engine
            .check_availability(&params.property_id, &range, &params.party())
            .await
        {
            Ok(result) => Ok(CallToolResult::success(vec![Content::text(
                result.to_string(),
            )])),
            Err(e) => Ok(failure("Availability check", &e)),
        }
    }

    #[tool(
        name = "generate_quote",
        description = "Price a stay night by night with stay-length and promo discounts, cleaning fee, service fee and tax. The quote is stored and valid for 24 hours; pass its id to create_booking.",
        annotations(read_only_hint = false, open_world_hint = true)
    )]
    async fn generate_quote(
        &self,
        Parameters(params): Parameters<QuoteToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let range = match params.stay.range() {
            Ok(range) => range,
            Err(e) => return Ok(failure("Quote", &e)),
        };
        let request = QuoteRequest {
            property_id: params.stay.property_id.clone(),
            range,
            party: params.stay.party(),
            promo_code: params.promo_code,
        };
        match self.engine.generate_quote(&request).await {
            Ok(quote) => {
                let text = quote.to_string();
                self.resources
                    .insert(
                        format!("staysync://quote/{}", quote.id),
                        format!("Quote {} ({})", quote.id, quote.range),
                        text.clone(),
                    )
                    .await;
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(failure("Quote", &e)),
        }
    }

    #[tool(
        name = "create_booking",
        description = "Confirm a booking from a quote id, or from stay details priced on the spot. Re-checks availability, reserves the nights atomically and returns the payment request. Linked properties are pushed to the PMS in the background.",
        annotations(read_only_hint = false, destructive_hint = false, open_world_hint = true)
    )]
    async fn create_booking(
        &self,
        Parameters(params): Parameters<BookingToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = match params.into_request() {
            Ok(request) => request,
            Err(e) => return Ok(failure("Booking", &e)),
        };
        match self.engine.create_booking(&request).await {
            Ok(confirmation) => {
                let text = confirmation.to_string();
                let id = &confirmation.reservation.id;
                self.resources
                    .insert(
                        format!("staysync://reservation/{id}"),
                        format!("Reservation {id}"),
                        confirmation.reservation.to_string(),
                    )
                    .await;
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(failure("Booking", &e)),
        }
    }

    #[tool(
        name = "cancel_booking",
        description = "Cancel a reservation and release its nights. Cancelling twice is harmless.",
        annotations(read_only_hint = false, destructive_hint = true, idempotent_hint = true)
    )]
    async fn cancel_booking(
        &self,
        Parameters(params): Parameters<ReservationToolParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.engine.cancel_booking(&params.reservation_id).await {
            Ok(reservation) => {
                let text = reservation.to_string();
                self.resources
                    .insert(
                        format!("staysync://reservation/{}", reservation.id),
                        format!("Reservation {}", reservation.id),
                        text.clone(),
                    )
                    .await;
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(failure("Cancellation", &e)),
        }
    }

    #[tool(
        name = "confirm_reservation",
        description = "Confirm a pending reservation, reserving its nights.",
        annotations(read_only_hint = false, destructive_hint = false)
    )]
    async fn confirm_reservation(
        &self,
        Parameters(params): Parameters<ReservationToolParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.engine.confirm_reservation(&params.reservation_id).await {
            Ok(reservation) => Ok(CallToolResult::success(vec![Content::text(
                reservation.to_string(),
            )])),
            Err(e) => Ok(failure("Confirmation", &e)),
        }
    }

    #[tool(
        name = "handle_external_event",
        description = "Apply a PMS reservation webhook (created, updated, cancelled). Safe to redeliver: duplicates are acknowledged without changing anything.",
        annotations(read_only_hint = false, idempotent_hint = true)
    )]
    async fn handle_external_event(
        &self,
        Parameters(params): Parameters<ExternalEventToolParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .engine
            .handle_webhook_payload(&params.event.to_string())
            .await
        {
            Ok(result) => Ok(CallToolResult::success(vec![Content::text(
                result.to_string(),
            )])),
            Err(e) => Ok(failure("Event processing", &e)),
        }
    }

    #[tool(
        name = "price_intelligence",
        description = "Analyze a property's rate calendar: price levels by percentile, scarcity and booking pressure, cheaper alternative dates around a requested stay, and pricing insights.",
        annotations(read_only_hint = true, open_world_hint = true)
    )]
    async fn price_intelligence(
        &self,
        Parameters(params): Parameters<IntelligenceToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let requested = match (params.check_in.as_deref(), params.check_out.as_deref()) {
            (Some(check_in), Some(check_out)) => match NightRange::parse(check_in, check_out) {
                Ok(range) => Some(range),
                Err(e) => return Ok(failure("Price intelligence", &e)),
            },
            (None, None) => None,
            _ => {
                return Ok(failure(
                    "Price intelligence",
                    &StayError::invalid("check_in and check_out must be given together"),
                ));
            }
        };
        match self
            .engine
            .price_intelligence(&params.property_id, params.window_days, requested)
            .await
        {
            Ok(report) => {
                let text = report.to_string();
                self.resources
                    .insert(
                        format!("staysync://property/{}/intelligence", params.property_id),
                        format!("Price intelligence: {}", params.property_id),
                        text.clone(),
                    )
                    .await;
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(failure("Price intelligence", &e)),
        }
    }

    #[tool(
        name = "block_dates",
        description = "Block nights on the internal calendar (owner stay, maintenance). Refuses if any night is already booked.",
        annotations(read_only_hint = false, idempotent_hint = true)
    )]
    async fn block_dates(
        &self,
        Parameters(params): Parameters<BlockToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let range = match NightRange::parse(&params.from, &params.to) {
            Ok(range) => range,
            Err(e) => return Ok(failure("Block", &e)),
        };
        match self
            .engine
            .block_dates(&params.property_id, &range, params.reason.as_deref())
            .await
        {
            Ok(nights) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Blocked {nights} nights on property {}: {range}",
                params.property_id
            ))])),
            Err(e) => Ok(failure("Block", &e)),
        }
    }

    #[tool(
        name = "unblock_dates",
        description = "Remove manual blocks from a range. Booked nights are left untouched.",
        annotations(read_only_hint = false, idempotent_hint = true)
    )]
    async fn unblock_dates(
        &self,
        Parameters(params): Parameters<BlockToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let range = match NightRange::parse(&params.from, &params.to) {
            Ok(range) => range,
            Err(e) => return Ok(failure("Unblock", &e)),
        };
        match self.engine.unblock_dates(&params.property_id, &range).await {
            Ok(nights) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Unblocked {nights} nights on property {}: {range}",
                params.property_id
            ))])),
            Err(e) => Ok(failure("Unblock", &e)),
        }
    }

    #[tool(
        name = "recent_events",
        description = "Show the most recent webhook deliveries with their outcome and processing latency.",
        annotations(read_only_hint = true)
    )]
    async fn recent_events(
        &self,
        Parameters(params): Parameters<EventsToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let limit = params
            .limit
            .unwrap_or(DEFAULT_EVENT_LIMIT)
            .clamp(1, MAX_EVENT_LIMIT);
        match self.engine.recent_events(limit).await {
            Ok(events) => {
                let mut text = String::new();
                if events.is_empty() {
                    text.push_str("No webhook deliveries recorded yet.\n");
                } else {
                    let _ = writeln!(text, "# Last {} webhook deliveries\n", events.len());
                    for e in &events {
                        let _ = write!(
                            text,
                            "- {} {} -> {} ({} ms)",
                            e.received_at.format("%Y-%m-%d %H:%M:%S"),
                            e.kind,
                            e.outcome,
                            e.latency_ms
                        );
                        if let Some(ref ext) = e.external_id {
                            let _ = write!(text, " external {ext}");
                        }
                        if !e.detail.is_empty() {
                            let _ = write!(text, ": {}", e.detail);
                        }
                        text.push('\n');
                    }
                }
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(failure("Event log", &e)),
        }
    }
}

fn template(uri: &str, name: &str, title: &str, description: &str) -> ResourceTemplate {
    ResourceTemplate {
        annotations: None,
        raw: RawResourceTemplate {
            uri_template: uri.into(),
            name: name.into(),
            title: Some(title.into()),
            description: Some(description.into()),
            mime_type: Some("text/plain".into()),
            icons: None,
        },
    }
}

#[tool_handler]
impl ServerHandler for StaySyncMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Availability, pricing and booking engine for vacation rentals.\n\
                 \n\
                 ## Booking flow\n\
                 - check_availability: can the stay be booked, and if not, why\n\
                 - generate_quote: itemized price, valid 24 hours\n\
                 - create_booking: confirm from a quote id (or stay details), returns the payment request\n\
                 - cancel_booking / confirm_reservation: reservation lifecycle\n\
                 \n\
                 ## Calendar\n\
                 - block_dates / unblock_dates: manual blocks on the internal calendar\n\
                 - price_intelligence: price levels, scarcity, cheaper alternative dates\n\
                 \n\
                 ## PMS sync\n\
                 - handle_external_event: apply a PMS reservation webhook (idempotent)\n\
                 - recent_events: audit log of webhook deliveries\n\
                 \n\
                 ## Tips\n\
                 - A Conflict error means someone else booked first: choose new dates.\n\
                 - A QuoteExpired error means the price is stale: generate a new quote."
                    .into(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let resources: Vec<Resource> = self
            .resources
            .list()
            .await
            .into_iter()
            .map(|(uri, name)| Resource {
                annotations: None,
                raw: RawResource {
                    uri,
                    name,
                    title: None,
                    description: None,
                    mime_type: Some("text/plain".into()),
                    size: None,
                    icons: None,
                    meta: None,
                },
            })
            .collect();
        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
            meta: None,
        })
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        Ok(ListResourceTemplatesResult {
            resource_templates: vec![
                template(
                    "staysync://quote/{id}",
                    "Quote",
                    "Price quote",
                    "Itemized quote (created via generate_quote)",
                ),
                template(
                    "staysync://reservation/{id}",
                    "Reservation",
                    "Reservation",
                    "Reservation summary (created via create_booking or cancel_booking)",
                ),
                template(
                    "staysync://property/{id}/intelligence",
                    "Price Intelligence",
                    "Price intelligence report",
                    "Latest report for a property (created via price_intelligence)",
                ),
            ],
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match self.resources.get(&request.uri).await {
            Some(entry) => Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(entry.text, request.uri)],
            }),
            None => Err(McpError::resource_not_found(
                format!("resource not found: {}", request.uri),
                None,
            )),
        }
    }
}
