use futures::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use samanvay_core::{ChatMessage, ConvoyRoute, Coordinate, Incident, ThreatZone};
use samanvay_io::{
    ConvoyPlanRequest, DetectionReport, DetectionRequest, DetectionService,
    MessageHistoryService, RoutingService, ScenarioService, ServiceError,
};
use samanvay_wire::http::{
    ConvoyPlanBody, ConvoyResponseBody, DetectionResponseBody, ErrorDetailBody, IncidentBody,
    LatLngBody, MessageRecordBody, ThreatZoneBody,
};
use samanvay_wire::WireError;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{ServerClientConfig, ServerConfigError};

/// HTTP implementation of the collaborator services.
#[derive(Debug, Clone)]
pub struct BackendClient {
    config: ServerClientConfig,
    http: Client,
}

impl BackendClient {
    pub fn new(config: ServerClientConfig) -> Result<Self, ServerConfigError> {
        config.validate()?;
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ServerConfigError::HttpClient)?;
        Ok(Self { config, http })
    }

    #[must_use]
    pub fn config(&self) -> &ServerClientConfig {
        &self.config
    }

    fn get(&self, resource: &str) -> RequestBuilder {
        self.authorize(self.http.get(self.config.resource_url(resource)))
    }

    fn post(&self, resource: &str) -> RequestBuilder {
        self.authorize(self.http.post(self.config.resource_url(resource)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch_records<B, T>(
        &self,
        resource: &'static str,
        convert: impl Fn(B) -> Result<T, WireError>,
    ) -> Result<Vec<T>, ServiceError>
    where
        B: DeserializeOwned,
    {
        let response = self.get(resource).send().await.map_err(request_error)?;
        let bodies: Vec<B> = read_json(response).await?;

        let mut records = Vec::with_capacity(bodies.len());
        for body in bodies {
            match convert(body) {
                Ok(record) => records.push(record),
                Err(error) => warn!(resource, %error, "skipping invalid record"),
            }
        }
        debug!(resource, count = records.len(), "fetched records");
        Ok(records)
    }
}

impl RoutingService for BackendClient {
    fn plan_convoy(
        &self,
        request: ConvoyPlanRequest,
    ) -> BoxFuture<'_, Result<ConvoyRoute, ServiceError>> {
        Box::pin(async move {
            let body = ConvoyPlanBody::new(request.name, request.start, request.end);
            let response = self
                .post("convoys")
                .json(&body)
                .send()
                .await
                .map_err(request_error)?;
            let route: ConvoyResponseBody = read_json(response).await?;
            route.into_route().map_err(decode_error)
        })
    }
}

impl ScenarioService for BackendClient {
    fn initialize_scenario(&self, center: Coordinate) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async move {
            let response = self
                .post("scenario/initialize")
                .json(&LatLngBody::from(center))
                .send()
                .await
                .map_err(request_error)?;
            let _: serde_json::Value = read_json(response).await?;
            Ok(())
        })
    }

    fn fetch_incidents(&self) -> BoxFuture<'_, Result<Vec<Incident>, ServiceError>> {
        Box::pin(self.fetch_records("incidents", IncidentBody::into_incident))
    }

    fn fetch_threat_zones(&self) -> BoxFuture<'_, Result<Vec<ThreatZone>, ServiceError>> {
        Box::pin(self.fetch_records("threat_zones", ThreatZoneBody::into_zone))
    }
}

impl MessageHistoryService for BackendClient {
    fn fetch_messages(&self) -> BoxFuture<'_, Result<Vec<ChatMessage>, ServiceError>> {
        Box::pin(self.fetch_records("messages", MessageRecordBody::into_message))
    }
}

impl DetectionService for BackendClient {
    fn detect(
        &self,
        request: DetectionRequest,
    ) -> BoxFuture<'_, Result<DetectionReport, ServiceError>> {
        Box::pin(async move {
            let video = Part::bytes(request.video.to_vec()).file_name(request.file_name);
            let form = Form::new()
                .part("video", video)
                .text("lat", request.location.latitude().to_string())
                .text("lng", request.location.longitude().to_string());

            let response = self
                .post("detect")
                .multipart(form)
                .send()
                .await
                .map_err(request_error)?;
            let body: DetectionResponseBody = read_json(response).await?;
            Ok(DetectionReport {
                message: body.message,
                detection_summary: body.detection_summary,
                threat_detected: body.threat_detected,
            })
        })
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let status = response.status();
    let body = response.bytes().await.map_err(request_error)?;

    if !status.is_success() {
        let message = match serde_json::from_slice::<ErrorDetailBody>(&body) {
            Ok(detail) => detail.message(),
            Err(_) if body.is_empty() => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_owned(),
            Err(_) => String::from_utf8_lossy(&body).trim().to_owned(),
        };
        return Err(ServiceError::Http {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_slice(&body).map_err(|error| ServiceError::Decode(error.to_string()))
}

fn request_error(error: reqwest::Error) -> ServiceError {
    if error.is_timeout() {
        ServiceError::Timeout
    } else if error.is_decode() {
        ServiceError::Decode(error.to_string())
    } else {
        ServiceError::Request(error.to_string())
    }
}

fn decode_error(error: WireError) -> ServiceError {
    ServiceError::Decode(error.to_string())
}
