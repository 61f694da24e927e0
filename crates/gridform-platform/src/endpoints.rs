//! Platform endpoint catalogue
//!
//! Endpoint names are relative to [`API_PREFIX`] on the controller.

pub const API_PREFIX: &str = "/restmachine/cloudapi";

pub const USER_AUTHENTICATE: &str = "user/authenticate";

// Compute
/// `compute/create` for `KVM_X86` computes
pub const COMPUTE_CREATE_X86: &str = "kvmx86/create";
/// `compute/create` for `KVM_PPC` computes
pub const COMPUTE_CREATE_PPC: &str = "kvmppc/create";
pub const COMPUTE_GET: &str = "compute/get";
pub const COMPUTE_RESIZE: &str = "compute/resize";
pub const COMPUTE_UPDATE: &str = "compute/update";
pub const COMPUTE_DELETE: &str = "compute/delete";
pub const COMPUTE_DISK_ATTACH: &str = "compute/diskAttach";
pub const COMPUTE_DISK_DETACH: &str = "compute/diskDetach";
pub const COMPUTE_NET_ATTACH: &str = "compute/netAttach";
pub const COMPUTE_NET_DETACH: &str = "compute/netDetach";
pub const COMPUTE_PFW_ADD: &str = "compute/pfwAdd";
pub const COMPUTE_PFW_DEL: &str = "compute/pfwDel";
pub const COMPUTE_PFW_LIST: &str = "compute/pfwList";

// Resource groups
pub const RG_CREATE: &str = "rg/create";
pub const RG_GET: &str = "rg/get";
pub const RG_LIST: &str = "rg/list";
pub const RG_UPDATE: &str = "rg/update";
pub const RG_DELETE: &str = "rg/delete";
pub const RG_LIST_COMPUTES: &str = "rg/listComputes";

// Disks
pub const DISKS_CREATE: &str = "disks/create";
pub const DISKS_GET: &str = "disks/get";
pub const DISKS_LIST: &str = "disks/list";
pub const DISKS_RESIZE: &str = "disks/resize";
pub const DISKS_RENAME: &str = "disks/rename";
pub const DISKS_DELETE: &str = "disks/delete";

// ViNS
pub const VINS_CREATE_IN_ACCOUNT: &str = "vins/createInAccount";
pub const VINS_CREATE_IN_RG: &str = "vins/createInRG";
pub const VINS_GET: &str = "vins/get";
pub const VINS_SEARCH: &str = "vins/search";
pub const VINS_DELETE: &str = "vins/delete";
pub const VINS_EXTNET_CONNECT: &str = "vins/extNetConnect";
pub const VINS_EXTNET_DISCONNECT: &str = "vins/extNetDisconnect";

// Lookups
pub const ACCOUNTS_LIST: &str = "accounts/list";
pub const LOCATIONS_LIST: &str = "locations/list";
