use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use shared::{
    domain::{Address, HouseId, HouseRecord, Wei},
    error::ApiError,
    protocol::{BalanceResponse, CommitOutcome, ManagerResponse, SubmitEnvelope},
};

use crate::error::QueryError;

/// What the adapter observed for a submission. `TimedOut` means the deadline
/// expired with the outcome unknown — the ledger may still commit the
/// request, so the only honest recovery is a later refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitStatus {
    Resolved(CommitOutcome),
    TimedOut,
}

/// Seam between the lifecycle controller and the ledger. Read operations
/// never mutate and carry no ordering guarantee across separate calls; a
/// submission suspends the caller until the ledger answers or the deadline
/// expires.
#[async_trait]
pub trait ChainAccess: Send + Sync {
    async fn manager(&self) -> Result<Address, QueryError>;
    async fn balance(&self, address: Address) -> Result<Wei, QueryError>;
    async fn house(&self, house_id: HouseId) -> Result<Option<HouseRecord>, QueryError>;
    async fn houses_owned_by(&self, owner: Address) -> Result<Vec<HouseRecord>, QueryError>;
    async fn listed_houses(&self) -> Result<Vec<HouseRecord>, QueryError>;
    async fn submit(&self, envelope: SubmitEnvelope) -> Result<SubmitStatus, QueryError>;
}

pub const DEFAULT_SUBMIT_DEADLINE: Duration = Duration::from_secs(30);

/// `ChainAccess` over the gateway node's HTTP interface.
pub struct HttpChainAccess {
    http: Client,
    base_url: Url,
    submit_deadline: Duration,
}

impl HttpChainAccess {
    pub fn new(gateway_url: &str) -> Result<Self, QueryError> {
        let base_url =
            Url::parse(gateway_url).map_err(|err| QueryError::InvalidEndpoint(err.to_string()))?;
        Ok(Self {
            http: Client::new(),
            base_url,
            submit_deadline: DEFAULT_SUBMIT_DEADLINE,
        })
    }

    pub fn with_submit_deadline(mut self, deadline: Duration) -> Self {
        self.submit_deadline = deadline;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, QueryError> {
        self.base_url
            .join(path)
            .map_err(|err| QueryError::InvalidEndpoint(err.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, QueryError> {
        let response = self.http.get(self.endpoint(path)?).send().await?;
        let response = reject_api_error(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChainAccess for HttpChainAccess {
    async fn manager(&self) -> Result<Address, QueryError> {
        let dto: ManagerResponse = self.get_json("/chain/manager").await?;
        Ok(dto.manager)
    }

    async fn balance(&self, address: Address) -> Result<Wei, QueryError> {
        let dto: BalanceResponse = self
            .get_json(&format!("/accounts/{address}/balance"))
            .await?;
        Ok(dto.balance)
    }

    async fn house(&self, house_id: HouseId) -> Result<Option<HouseRecord>, QueryError> {
        let response = self
            .http
            .get(self.endpoint(&format!("/houses/{house_id}"))?)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = reject_api_error(response).await?;
        Ok(Some(response.json().await?))
    }

    async fn houses_owned_by(&self, owner: Address) -> Result<Vec<HouseRecord>, QueryError> {
        let response = self
            .http
            .get(self.endpoint("/houses")?)
            .query(&[("owner", owner.to_string())])
            .send()
            .await?;
        let response = reject_api_error(response).await?;
        Ok(response.json().await?)
    }

    async fn listed_houses(&self) -> Result<Vec<HouseRecord>, QueryError> {
        self.get_json("/houses/listed").await
    }

    async fn submit(&self, envelope: SubmitEnvelope) -> Result<SubmitStatus, QueryError> {
        let endpoint = self.endpoint("/submit")?;
        let send = async {
            let response = self.http.post(endpoint).json(&envelope).send().await?;
            let response = reject_api_error(response).await?;
            let outcome: CommitOutcome = response.json().await?;
            Ok::<_, QueryError>(outcome)
        };
        match tokio::time::timeout(self.submit_deadline, send).await {
            Ok(Ok(outcome)) => Ok(SubmitStatus::Resolved(outcome)),
            Ok(Err(err)) => Err(err),
            Err(_) => Ok(SubmitStatus::TimedOut),
        }
    }
}

async fn reject_api_error(response: reqwest::Response) -> Result<reqwest::Response, QueryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match response.json::<ApiError>().await {
        Ok(api) => Err(QueryError::Api {
            code: api.code,
            message: api.message,
        }),
        Err(_) => Err(QueryError::Transport(format!("gateway returned {status}"))),
    }
}
