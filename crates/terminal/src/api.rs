//! REST client for the lane, checkout, inventory and waitlist endpoints.
//!
//! Every command goes through [`LaneApi`] with the terminal's bearer token.
//! Non-2xx responses become [`CommandError::Rejected`], whose
//! [`recovery`](CommandError::recovery) tells the terminal what to do next
//! based only on the HTTP status and the machine-readable `code`.

use frontdesk_core::checkout::{CheckoutContext, CheckoutView};
use frontdesk_core::customer::Visit;
use frontdesk_core::events::{CheckoutCompletedPayload, SuggestedResource};
use frontdesk_core::inventory::{InventorySnapshot, Resource};
use frontdesk_core::lane::{ActiveCheckin, LaneSession, LaneSnapshot, Mode};
use frontdesk_core::rental::{Actor, RentalTier, ResourceRef, ResourceStatus, ResourceType};
use frontdesk_core::types::{DbId, Timestamp};
use frontdesk_core::waitlist::WaitlistEntry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// HTTP client for one terminal.
#[derive(Clone)]
pub struct LaneApi {
    client: reqwest::Client,
    /// Base URL including the version prefix, e.g. `http://host:3000/api/v1`.
    api_url: String,
    token: String,
}

/// What the terminal should do after a rejected command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The resource went to another lane; pick the next one of the same tier.
    ReselectResource,
    /// The customer is already checked in; show their current stay.
    ShowActiveCheckin,
    /// The token expired or was refused.
    Reauthenticate,
    /// A step is missing or the input was invalid; ask the operator again.
    Reprompt,
    /// The checkout board moved on; refetch the requests.
    RefreshCheckouts,
    /// Local lane state is stale; refetch the session snapshot.
    ResyncLane,
    Fatal,
}

/// Errors from the terminal REST layer.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("Command rejected ({status} {code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
        /// Full error body, including structured conflict fields.
        body: Value,
    },
}

impl CommandError {
    /// Build a rejection from a status and raw body text. Bodies that are
    /// not the usual `{error, code}` JSON keep the text as the message.
    pub fn rejected(status: u16, text: &str) -> Self {
        let body: Value = serde_json::from_str(text).unwrap_or_else(|_| json!({ "error": text }));
        let code = body["code"].as_str().unwrap_or_default().to_string();
        let message = body["error"].as_str().unwrap_or(text).to_string();
        Self::Rejected {
            status,
            code,
            message,
            body,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => Some(code.as_str()),
            Self::Request(_) => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
        }
    }

    pub fn recovery(&self) -> Recovery {
        let Self::Rejected { status, code, .. } = self else {
            return Recovery::ResyncLane;
        };
        match (*status, code.as_str()) {
            (409, "RACE_LOST" | "RESOURCE_UNAVAILABLE") => Recovery::ReselectResource,
            (409, "ALREADY_CHECKED_IN") => Recovery::ShowActiveCheckin,
            (409, "ALREADY_CLAIMED") | (403, "NOT_CLAIM_HOLDER") => Recovery::RefreshCheckouts,
            (409, "LANE_OCCUPIED" | "SELECTION_LOCKED" | "ALREADY_PAID") => Recovery::ResyncLane,
            (409, "CUSTOMER_BANNED" | "RESOURCE_OCCUPIED" | "CUSTOMER_ON_OTHER_LANE") => {
                Recovery::Reprompt
            }
            (400, "NO_ACTIVE_SESSION" | "ALREADY_ASSIGNED" | "NO_PENDING_CONFIRMATION") => {
                Recovery::ResyncLane
            }
            (400, _) => Recovery::Reprompt,
            (401, _) => Recovery::Reauthenticate,
            (403, _) => Recovery::Fatal,
            (404, _) => Recovery::ResyncLane,
            (409, _) => Recovery::ResyncLane,
            _ => Recovery::Fatal,
        }
    }

    /// The replacement offered with a `RACE_LOST` or `RESOURCE_UNAVAILABLE`.
    pub fn suggested_resource(&self) -> Option<SuggestedResource> {
        match self {
            Self::Rejected { body, .. } => {
                serde_json::from_value(body.get("suggestedResource")?.clone()).ok()
            }
            Self::Request(_) => None,
        }
    }

    /// The customer's current stay carried by `ALREADY_CHECKED_IN`.
    pub fn active_checkin(&self) -> Option<ActiveCheckin> {
        match self {
            Self::Rejected { body, .. } => {
                serde_json::from_value(body.get("activeCheckin")?.clone()).ok()
            }
            Self::Request(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// How the customer was identified at the counter. Exactly one is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerKey {
    Id(DbId),
    IdScan(String),
    Membership(String),
}

impl CustomerKey {
    fn body(&self, mode: Mode) -> Value {
        match self {
            Self::Id(id) => json!({ "customerId": id, "mode": mode }),
            Self::IdScan(scan) => json!({ "idScanValue": scan, "mode": mode }),
            Self::Membership(number) => json!({ "membershipScanValue": number, "mode": mode }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStarted {
    pub session_id: String,
    pub customer_name: String,
    pub membership_number: Option<String>,
    pub mode: Mode,
    pub block_ends_at: Option<Timestamp>,
    pub active_assigned_resource_type: Option<ResourceType>,
    pub active_assigned_resource_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResult {
    pub needs_confirmation: bool,
    pub resource: Resource,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinReceipt {
    pub visit_id: String,
    pub customer_id: DbId,
    pub mode: Mode,
    pub rental_type: RentalTier,
    pub assigned_resource_type: ResourceType,
    pub assigned_resource_number: String,
    pub checkin_at: Timestamp,
    pub checkout_at: Timestamp,
    pub waitlist_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Cleared {
    cleared: bool,
}

impl LaneApi {
    /// * `api_url` - base URL including `/api/v1`.
    /// * `token`   - bearer token for this terminal.
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, token)
    }

    /// Reuse an existing [`reqwest::Client`] across terminals.
    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Swap in a fresh token after [`Recovery::Reauthenticate`].
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = token.into();
    }

    // ---- lane session ----

    pub async fn start_session(
        &self,
        lane: &str,
        customer: &CustomerKey,
        mode: Mode,
    ) -> Result<SessionStarted, CommandError> {
        self.post(&lane_path(lane, "start"), &customer.body(mode)).await
    }

    pub async fn lane_snapshot(&self, lane: &str) -> Result<LaneSnapshot, CommandError> {
        self.get(&lane_path(lane, "session")).await
    }

    pub async fn propose_selection(
        &self,
        lane: &str,
        tier: RentalTier,
        by: Actor,
    ) -> Result<LaneSession, CommandError> {
        let body = json!({ "rentalType": tier, "proposedBy": by });
        self.post(&lane_path(lane, "propose-selection"), &body).await
    }

    pub async fn confirm_selection(&self, lane: &str, by: Actor) -> Result<LaneSession, CommandError> {
        let body = json!({ "confirmedBy": by });
        self.post(&lane_path(lane, "confirm-selection"), &body).await
    }

    pub async fn acknowledge_selection(
        &self,
        lane: &str,
        by: Actor,
    ) -> Result<LaneSession, CommandError> {
        let body = json!({ "acknowledgedBy": by });
        self.post(&lane_path(lane, "acknowledge-selection"), &body).await
    }

    pub async fn join_waitlist(
        &self,
        lane: &str,
        desired: RentalTier,
        backup: RentalTier,
    ) -> Result<WaitlistEntry, CommandError> {
        let body = json!({ "desiredTier": desired, "backupTier": backup });
        self.post(&lane_path(lane, "waitlist"), &body).await
    }

    pub async fn create_payment_intent(&self, lane: &str) -> Result<LaneSession, CommandError> {
        self.post(&lane_path(lane, "payment-intent"), &json!({})).await
    }

    pub async fn mark_paid(
        &self,
        lane: &str,
        payment_intent_id: &str,
    ) -> Result<LaneSession, CommandError> {
        let body = json!({ "paymentIntentId": payment_intent_id });
        self.post(&lane_path(lane, "mark-paid"), &body).await
    }

    pub async fn payment_failed(&self, lane: &str, reason: &str) -> Result<LaneSession, CommandError> {
        self.post(&lane_path(lane, "payment-failed"), &json!({ "reason": reason }))
            .await
    }

    pub async fn sign_agreement(&self, lane: &str) -> Result<LaneSession, CommandError> {
        self.post(&lane_path(lane, "sign-agreement"), &json!({})).await
    }

    pub async fn manual_signature_override(
        &self,
        lane: &str,
        reason: &str,
    ) -> Result<LaneSession, CommandError> {
        let body = json!({ "reason": reason });
        self.post(&lane_path(lane, "manual-signature-override"), &body)
            .await
    }

    pub async fn assign(
        &self,
        lane: &str,
        resource: ResourceRef,
    ) -> Result<AssignResult, CommandError> {
        let body = json!({
            "resourceType": resource.resource_type,
            "resourceId": resource.resource_id,
        });
        self.post(&lane_path(lane, "assign"), &body).await
    }

    pub async fn confirm_assignment(&self, lane: &str) -> Result<LaneSession, CommandError> {
        self.post(&lane_path(lane, "confirm-assignment"), &json!({})).await
    }

    pub async fn decline_assignment(&self, lane: &str) -> Result<LaneSession, CommandError> {
        self.post(&lane_path(lane, "decline-assignment"), &json!({})).await
    }

    pub async fn complete_checkin(&self, lane: &str) -> Result<CheckinReceipt, CommandError> {
        self.post(&lane_path(lane, "complete"), &json!({})).await
    }

    /// Returns whether there was a session to clear.
    pub async fn reset_lane(&self, lane: &str) -> Result<bool, CommandError> {
        let cleared: Cleared = self.post(&lane_path(lane, "reset"), &json!({})).await?;
        Ok(cleared.cleared)
    }

    // ---- checkout ----

    pub async fn resolve_checkout(
        &self,
        resource_type: ResourceType,
        number: &str,
    ) -> Result<CheckoutContext, CommandError> {
        let response = self
            .client
            .get(format!("{}/checkout/resolve", self.api_url))
            .bearer_auth(&self.token)
            .query(&[("resourceType", resource_type.as_str()), ("number", number)])
            .send()
            .await?;
        Self::parse_response(response).await
    }

    pub async fn request_checkout(
        &self,
        resource_type: ResourceType,
        number: &str,
    ) -> Result<CheckoutView, CommandError> {
        let body = json!({ "resourceType": resource_type, "number": number });
        self.post("/checkout/request", &body).await
    }

    pub async fn list_checkouts(&self) -> Result<Vec<CheckoutView>, CommandError> {
        self.get("/checkout/requests").await
    }

    pub async fn claim_checkout(&self, request_id: &str) -> Result<CheckoutView, CommandError> {
        self.post(&checkout_path(request_id, "claim"), &json!({})).await
    }

    pub async fn confirm_items(&self, request_id: &str) -> Result<CheckoutView, CommandError> {
        self.post(&checkout_path(request_id, "confirm-items"), &json!({}))
            .await
    }

    pub async fn mark_fee_paid(&self, request_id: &str) -> Result<CheckoutView, CommandError> {
        self.post(&checkout_path(request_id, "mark-fee-paid"), &json!({}))
            .await
    }

    pub async fn complete_checkout(
        &self,
        request_id: &str,
    ) -> Result<CheckoutCompletedPayload, CommandError> {
        self.post(&checkout_path(request_id, "complete"), &json!({}))
            .await
    }

    pub async fn cancel_checkout(&self, request_id: &str) -> Result<CheckoutView, CommandError> {
        self.post(&checkout_path(request_id, "cancel"), &json!({})).await
    }

    // ---- inventory ----

    pub async fn inventory(&self) -> Result<InventorySnapshot, CommandError> {
        self.get("/inventory/detailed").await
    }

    pub async fn set_resource_status(
        &self,
        resource: ResourceRef,
        status: ResourceStatus,
    ) -> Result<Resource, CommandError> {
        let response = self
            .client
            .patch(format!(
                "{}/inventory/{}/{}/status",
                self.api_url,
                resource.resource_type.as_str(),
                resource.resource_id
            ))
            .bearer_auth(&self.token)
            .json(&json!({ "status": status }))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    // ---- waitlist ----

    pub async fn waitlist(&self) -> Result<Vec<WaitlistEntry>, CommandError> {
        self.get("/waitlist").await
    }

    pub async fn offer_waitlist(
        &self,
        entry_id: &str,
        resource: ResourceRef,
    ) -> Result<WaitlistEntry, CommandError> {
        let body = json!({
            "resourceType": resource.resource_type,
            "resourceId": resource.resource_id,
        });
        self.post(&format!("/waitlist/{entry_id}/offer"), &body).await
    }

    pub async fn fulfill_waitlist(&self, entry_id: &str) -> Result<Visit, CommandError> {
        self.post(&format!("/waitlist/{entry_id}/fulfill"), &json!({}))
            .await
    }

    pub async fn cancel_waitlist(&self, entry_id: &str) -> Result<WaitlistEntry, CommandError> {
        self.post(&format!("/waitlist/{entry_id}/cancel"), &json!({}))
            .await
    }

    // ---- private helpers ----

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CommandError> {
        let response = self
            .client
            .get(format!("{}{path}", self.api_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, CommandError> {
        let response = self
            .client
            .post(format!("{}{path}", self.api_url))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Return the response unchanged on success, or a
    /// [`CommandError::Rejected`] built from the error body.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, CommandError> {
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(CommandError::rejected(status.as_u16(), &text));
        }
        Ok(response)
    }

    /// Unwrap the `{data}` envelope of a successful response.
    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CommandError> {
        let response = Self::ensure_success(response).await?;
        let envelope = response.json::<Envelope<T>>().await?;
        Ok(envelope.data)
    }
}

fn lane_path(lane: &str, action: &str) -> String {
    format!("/checkin/lane/{lane}/{action}")
}

fn checkout_path(request_id: &str, action: &str) -> String {
    format!("/checkout/{request_id}/{action}")
}
