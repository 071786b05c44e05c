//! Cached reads of the loan portfolio resources.

use log::*;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::cache::{ResourceCache, ResourceKind};
use crate::error::Error;
use crate::http::Gateway;

const LOANS_PATH: &str = "/loans/documents/getAllLoan";
const PORTFOLIO_REPORT_PATH: &str = "/reports/portfolio";
const MATURITY_REPORT_PATH: &str = "/reports/maturity";
const HIGH_RISK_REPORT_PATH: &str = "/reports/high-risk";

fn loan_path(id: &str) -> String {
    format!("/loans/documents/getLoan/{}", urlencoding::encode(id))
}

fn schedule_path(id: &str) -> String {
    format!("/loans/{}/schedule", urlencoding::encode(id))
}

/// Loan and report reads served cache-first for the logged-in user.
#[derive(Clone)]
pub struct PortfolioApi {
    gateway: Gateway,
    cache: ResourceCache,
}

impl PortfolioApi {
    pub fn new(gateway: Gateway, cache: ResourceCache) -> Self {
        Self { gateway, cache }
    }

    async fn user_id(&self) -> String {
        self.gateway.coordinator().credential_store().user_id().await
    }

    /// The loan list.
    pub async fn loans(&self) -> Result<Value, Error> {
        let user_id = self.user_id().await;
        self.cache
            .fetch_or_load(&user_id, ResourceKind::LoanDocuments, None, || {
                self.gateway.get_json(LOANS_PATH)
            })
            .await
    }

    /// Refetch the loan list and overwrite the cached copy.
    pub async fn refresh_loans(&self) -> Result<Value, Error> {
        let user_id = self.user_id().await;
        let loans = self.gateway.get_json(LOANS_PATH).await?;
        self.cache
            .write(&user_id, ResourceKind::LoanDocuments, None, loans.clone())
            .await?;
        Ok(loans)
    }

    /// A single loan document.
    pub async fn loan(&self, id: &str) -> Result<Value, Error> {
        let user_id = self.user_id().await;
        let path = loan_path(id);
        self.cache
            .fetch_or_load(&user_id, ResourceKind::LoanDetail, Some(id), || {
                self.gateway.get_json(&path)
            })
            .await
    }

    /// Repayment schedule of a loan.
    pub async fn schedule(&self, id: &str) -> Result<Value, Error> {
        let user_id = self.user_id().await;
        let path = schedule_path(id);
        self.cache
            .fetch_or_load(&user_id, ResourceKind::LoanSchedule, Some(id), || {
                self.gateway.get_json(&path)
            })
            .await
    }

    /// Portfolio, maturity and high-risk reports, fetched together.
    ///
    /// The three requests run concurrently. If any of them fails the whole read
    /// fails and nothing is cached.
    pub async fn reports(&self) -> Result<Value, Error> {
        let user_id = self.user_id().await;
        self.cache
            .fetch_or_load(&user_id, ResourceKind::ReportData, None, || async {
                let (portfolio, maturity, high_risk) = futures_util::try_join!(
                    self.gateway.get_json(PORTFOLIO_REPORT_PATH),
                    self.gateway.get_json(MATURITY_REPORT_PATH),
                    self.gateway.get_json(HIGH_RISK_REPORT_PATH),
                )?;
                Ok::<Value, Error>(json!({
                    "portfolio": portfolio,
                    "maturity": maturity,
                    "highRisk": high_risk,
                }))
            })
            .await
    }

    /// Warm the cached loan detail in the background, e.g. on hover.
    pub async fn prefetch_loan(&self, id: &str) -> JoinHandle<()> {
        let user_id = self.user_id().await;
        let gateway = self.gateway.clone();
        let path = loan_path(id);
        trace!("Prefetching loan {}", id);
        self.cache
            .prefetch(&user_id, ResourceKind::LoanDetail, id, move || async move {
                gateway.get_json(&path).await
            })
    }

    /// Drop the cached copy of one loan's detail and schedule.
    pub async fn invalidate_loan(&self, id: &str) -> Result<(), Error> {
        let user_id = self.user_id().await;
        self.cache
            .invalidate(&user_id, ResourceKind::LoanDetail, Some(id))
            .await?;
        self.cache
            .invalidate(&user_id, ResourceKind::LoanSchedule, Some(id))
            .await
    }
}
