use log::{debug, warn};
use std::collections::HashSet;

use super::core::HrApiClient;
use crate::auth::Token;
use crate::error::Result;
use crate::hr_api::types::{Collaborator, CollaboratorPage, CollaboratorsResponse};

impl HrApiClient {
    /// Fetches a single page of collaborators.
    ///
    /// An empty `next_page_token` in the response is normalised to `None`.
    pub async fn list_collaborators(
        &self,
        token: &Token,
        company_id: &str,
        page_token: Option<&str>,
    ) -> Result<CollaboratorPage> {
        let url = self.api_endpoint(&["companies", company_id, "collaborators"]);
        debug!("GET {url} (page token: {page_token:?})");

        let mut request = self.client().get(url);
        if let Some(page_token) = page_token {
            request = request.query(&[("nextPageToken", page_token)]);
        }

        let response = self
            .send_checked(self.auth_request(request, token), "listing collaborators")
            .await?;
        let body = response.bytes().await?;
        let page: CollaboratorsResponse = serde_json::from_slice(&body)?;

        Ok(CollaboratorPage {
            items: page.collaborators,
            next_page_token: page
                .meta
                .and_then(|meta| meta.next_page_token)
                .filter(|token| !token.is_empty()),
        })
    }

    /// Walks every page of the collaborator listing and concatenates the items
    /// in the order the API returned them.
    ///
    /// `on_page` is called after each page with the page number (1-based) and
    /// the running total.
    pub async fn list_all_collaborators<F>(
        &self,
        token: &Token,
        company_id: &str,
        mut on_page: F,
    ) -> Result<Vec<Collaborator>>
    where
        F: FnMut(usize, usize),
    {
        let mut all_collaborators = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        let mut page_count = 0;

        loop {
            let page = self
                .list_collaborators(token, company_id, cursor.as_deref())
                .await?;
            page_count += 1;

            all_collaborators.extend(page.items);
            on_page(page_count, all_collaborators.len());

            match page.next_page_token {
                Some(next) if !seen_tokens.insert(next.clone()) => {
                    warn!("Pagination token {next:?} returned twice, stopping after page {page_count}");
                    break;
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(
            "Fetched {} collaborators over {page_count} page(s)",
            all_collaborators.len()
        );

        Ok(all_collaborators)
    }
}
