//! Single-site fetch and in-memory joins
//!
//! Four bulk calls per site regardless of VM count: VMs, tag definitions,
//! tag memberships, NICs. Only the VM listing is allowed to fail the site;
//! the auxiliary listings degrade to empty data.

use crate::client::{ConnectParams, SiteClient, SiteConnector};
use crate::error::ClientError;
use crate::models::{Nic, RawVm, SiteConfig, SiteResult, Tag, TagMember, TagMembership};
use std::collections::HashMap;
use tracing::debug;

/// Fetch and join all records for one site. Never returns an error; failures
/// are recorded on the result.
pub async fn fetch_site(connector: &dyn SiteConnector, site: &SiteConfig) -> SiteResult {
    match fetch_site_vms(connector, site).await {
        Ok(vms) => SiteResult::success(site, vms),
        Err(e) => SiteResult::failure(site, e.to_string()),
    }
}

async fn fetch_site_vms(
    connector: &dyn SiteConnector,
    site: &SiteConfig,
) -> Result<Vec<RawVm>, ClientError> {
    let params = ConnectParams::from_site(site)?;
    let client = connector.connect(params).await?;

    let vms = client.list_vms().await?;
    let tags = auxiliary(&site.name, "tags", client.list_tags().await);
    let memberships = auxiliary(
        &site.name,
        "tag_members",
        client.list_tag_memberships().await,
    );
    let nics = auxiliary(&site.name, "machine_nics", client.list_nics().await);

    Ok(join_site_records(vms, &tags, &memberships, nics))
}

fn auxiliary<T>(site: &str, resource: &str, result: Result<Vec<T>, ClientError>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        debug!(site = %site, resource = %resource, error = %e, "Auxiliary listing unavailable");
        Vec::new()
    })
}

/// Attach resolved tag names and NICs to their VMs.
///
/// Tag memberships are matched to VMs by `$key`; NICs by the VM's `machine`.
/// Memberships for other resource types, unknown tags and unknown VMs are
/// skipped. Existing `_tags`/`_nics` on the input are replaced.
pub fn join_site_records(
    mut vms: Vec<RawVm>,
    tags: &[Tag],
    memberships: &[TagMembership],
    nics: Vec<Nic>,
) -> Vec<RawVm> {
    let mut by_key: HashMap<u64, usize> = HashMap::with_capacity(vms.len());
    let mut by_machine: HashMap<u64, usize> = HashMap::with_capacity(vms.len());
    for (index, vm) in vms.iter_mut().enumerate() {
        vm.tags.clear();
        vm.nics.clear();
        if let Some(key) = vm.key() {
            by_key.entry(key).or_insert(index);
        }
        if let Some(machine) = vm.machine() {
            by_machine.insert(machine, index);
        }
    }

    let tag_names: HashMap<u64, &str> = tags.iter().map(|t| (t.id, t.name.as_str())).collect();

    for membership in memberships {
        let vm_key = match membership.parse_member() {
            Some(TagMember::Vm(key)) => key,
            // Only VM memberships are joined.
            Some(TagMember::Other { .. }) | None => continue,
        };
        let (Some(&index), Some(name)) = (by_key.get(&vm_key), tag_names.get(&membership.tag))
        else {
            continue;
        };
        vms[index].tags.push((*name).to_string());
    }

    for nic in nics {
        if let Some(&index) = nic.machine().and_then(|m| by_machine.get(&m)) {
            vms[index].nics.push(nic);
        }
    }

    vms
}
