use super::pager::ResultPager;
use super::Resolution;
use crate::api::ListingsRequest;
use crate::error::Result;
use crate::filters::{FilterCriteria, QueryIdentity};
use crate::models::{PageEnvelope, PropertySummary};
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    List,
    Map,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViewMode::List => "list",
            ViewMode::Map => "map",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapStatus {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// Tag for the outstanding map fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapTicket {
    generation: u64,
    identity: QueryIdentity,
}

impl MapTicket {
    pub fn identity(&self) -> &QueryIdentity {
        &self.identity
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapQuery {
    pub ticket: MapTicket,
    pub request: ListingsRequest,
}

/// What the owner has to do after a mode switch.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewAction {
    None,
    /// The list has nothing usable for the current filters; sync the pager.
    LoadList,
    FetchMap(MapQuery),
}

/// Holds the current presentation mode and the one-shot map result.
///
/// It never fetches anything itself: switching modes hands back a
/// [`ViewAction`] and the owner performs the request.
#[derive(Debug, Clone)]
pub struct ViewModeController {
    mode: ViewMode,
    map_per_page: u32,
    map_identity: Option<QueryIdentity>,
    map_generation: u64,
    map_in_flight: Option<MapTicket>,
    map_status: MapStatus,
    map_items: Vec<PropertySummary>,
    map_total: u64,
}

impl ViewModeController {
    pub fn new(map_per_page: u32) -> Self {
        Self {
            mode: ViewMode::List,
            map_per_page,
            map_identity: None,
            map_generation: 0,
            map_in_flight: None,
            map_status: MapStatus::Idle,
            map_items: Vec::new(),
            map_total: 0,
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn map_status(&self) -> &MapStatus {
        &self.map_status
    }

    pub fn map_items(&self) -> &[PropertySummary] {
        &self.map_items
    }

    /// Listings that can actually be placed on the map.
    pub fn map_markers(&self) -> impl Iterator<Item = &PropertySummary> {
        self.map_items.iter().filter(|item| item.has_coordinates())
    }

    pub fn map_total(&self) -> u64 {
        self.map_total
    }

    /// More listings matched than the bounded map fetch returned.
    pub fn is_map_truncated(&self) -> bool {
        self.map_total > self.map_items.len() as u64
    }

    pub fn set_mode(
        &mut self,
        mode: ViewMode,
        criteria: &FilterCriteria,
        pager: &ResultPager,
    ) -> ViewAction {
        if mode == self.mode {
            return ViewAction::None;
        }
        info!("View mode {} -> {}", self.mode, mode);
        self.mode = mode;

        match mode {
            ViewMode::Map => match self.refresh_map(criteria) {
                Some(query) => ViewAction::FetchMap(query),
                None => ViewAction::None,
            },
            ViewMode::List => {
                let state = pager.state();
                if pager.is_current(&criteria.identity()) && (state.is_settled() || state.is_loading()) {
                    ViewAction::None
                } else {
                    ViewAction::LoadList
                }
            }
        }
    }

    /// Issue the map fetch for `criteria` unless a result (or request) for the
    /// same identity already exists.
    pub fn refresh_map(&mut self, criteria: &FilterCriteria) -> Option<MapQuery> {
        let identity = criteria.identity();
        let up_to_date = self.map_identity.as_ref() == Some(&identity)
            && matches!(self.map_status, MapStatus::Ready | MapStatus::Loading);
        if up_to_date {
            return None;
        }

        self.map_generation += 1;
        self.map_identity = Some(identity.clone());
        self.map_status = MapStatus::Loading;
        self.map_items.clear();
        self.map_total = 0;

        let ticket = MapTicket {
            generation: self.map_generation,
            identity,
        };
        self.map_in_flight = Some(ticket.clone());
        debug!("Map fetch issued for {}", ticket.identity);

        Some(MapQuery {
            ticket,
            request: ListingsRequest::map(criteria.clone(), self.map_per_page),
        })
    }

    pub fn resolve_map(&mut self, ticket: &MapTicket, result: Result<PageEnvelope>) -> Resolution {
        if self.map_in_flight.as_ref() != Some(ticket) {
            debug!("Discarding superseded map response for {}", ticket.identity);
            return Resolution::Superseded;
        }
        self.map_in_flight = None;

        match result {
            Ok(envelope) => {
                self.map_total = envelope.total;
                self.map_items = envelope.data;
                self.map_status = MapStatus::Ready;
                debug!(items = self.map_items.len(), total = self.map_total, "Map result ready");
            }
            Err(e) => {
                warn!("Map fetch failed: {}", e);
                self.map_status = MapStatus::Failed(e.to_string());
            }
        }
        Resolution::Applied
    }
}
