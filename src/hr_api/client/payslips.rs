use log::debug;
use reqwest::header::ACCEPT;

use super::core::HrApiClient;
use crate::auth::Token;
use crate::error::Result;
use crate::hr_api::types::{PayslipRecord, PayslipsResponse};

impl HrApiClient {
    /// Lists the payslip records of one collaborator.
    ///
    /// A missing or empty `payslips` field yields an empty list.
    pub async fn list_payslips(
        &self,
        token: &Token,
        company_id: &str,
        collaborator_id: &str,
    ) -> Result<Vec<PayslipRecord>> {
        // The upstream route is registered with a trailing slash.
        let url = self.api_endpoint(&[
            "companies",
            company_id,
            "collaborators",
            collaborator_id,
            "payslips",
            "",
        ]);
        debug!("GET {url}");

        let request = self.auth_request(self.client().get(url), token);
        let response = self.send_checked(request, "listing payslips").await?;
        let body = response.bytes().await?;
        let listing: PayslipsResponse = serde_json::from_slice(&body)?;

        Ok(listing
            .payslips
            .unwrap_or_default()
            .into_iter()
            .map(|mut record| {
                record.collaborator_id = collaborator_id.to_string();
                record
            })
            .collect())
    }

    /// Downloads the full payslip document as raw PDF bytes.
    pub async fn download_payslip_pdf(
        &self,
        token: &Token,
        company_id: &str,
        collaborator_id: &str,
        contract_id: &str,
        payslip_id: &str,
    ) -> Result<Vec<u8>> {
        let url = self.api_endpoint(&[
            "companies",
            company_id,
            "collaborators",
            collaborator_id,
            "contracts",
            contract_id,
            "payslips",
            payslip_id,
        ]);
        debug!("GET {url}");

        let request = self.auth_request(
            self.client().get(url).header(ACCEPT, "application/pdf"),
            token,
        );
        let response = self
            .send_checked(request, "downloading the payslip PDF")
            .await?;

        Ok(response.bytes().await?.to_vec())
    }
}
