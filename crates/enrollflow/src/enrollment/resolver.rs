use super::domain::{CountyId, ProgramId, ReferralSourceId};
use super::store::{EnrollmentStore, StoreError};

/// Best-effort lookups from human-entered free text to canonical
/// references.
///
/// A miss is a soft condition: the caller persists `None` alongside the
/// raw text (the `*_other` fallback fields) and enrollment moves on. An
/// admin repairs unresolved references later. Only store failures are
/// hard errors.
pub struct ReferenceResolver<'a, S> {
    store: &'a S,
}

impl<'a, S: EnrollmentStore> ReferenceResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Exact-match county lookup by name.
    pub fn resolve_county(&self, name: &str) -> Result<Option<CountyId>, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        match self.store.find_county_by_name(name)? {
            Some(county) => Ok(Some(county.id)),
            None => {
                tracing::warn!(county = name, "no county matched, keeping free text only");
                Ok(None)
            }
        }
    }

    /// Two-step lookup: source-type name to canonical type, then the
    /// (county, type) pair. A miss at either step yields `None`.
    pub fn resolve_referral_source(
        &self,
        source_type_name: &str,
        county: Option<&CountyId>,
    ) -> Result<Option<ReferralSourceId>, StoreError> {
        let source_type_name = source_type_name.trim();
        if source_type_name.is_empty() {
            return Ok(None);
        }

        let Some(source_type) = self
            .store
            .find_referral_source_type_by_name(source_type_name)?
        else {
            tracing::warn!(
                source_type = source_type_name,
                "no referral source type matched, keeping free text only"
            );
            return Ok(None);
        };

        let Some(county) = county else {
            tracing::warn!(
                source_type = source_type_name,
                "referral source needs a resolved county, keeping free text only"
            );
            return Ok(None);
        };

        match self.store.find_referral_source(county, &source_type.id)? {
            Some(source) => Ok(Some(source.id)),
            None => {
                tracing::warn!(
                    source_type = source_type_name,
                    county = county.0,
                    "no referral source matched the county/type pair"
                );
                Ok(None)
            }
        }
    }

    /// Exact-match program lookup by unique code.
    pub fn resolve_program_by_code(&self, code: &str) -> Result<Option<ProgramId>, StoreError> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(None);
        }
        match self.store.find_program_by_code(code)? {
            Some(program) => Ok(Some(program.id)),
            None => {
                tracing::warn!(program_code = code, "no program matched the submitted code");
                Ok(None)
            }
        }
    }
}
