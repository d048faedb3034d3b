//! Routing table: external sources mapped onto parameter targets.

use crate::config::ROUTE_COUNT;
use crate::midi::MidiPort;

/// Where a routed value comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteSource {
    /// A CV input channel, normalized over its voltage range
    CvIn(usize),
    /// A MIDI control change; `None` filters accept any port/channel
    MidiCc {
        port: Option<MidiPort>,
        channel: Option<u8>,
        controller: u8,
    },
}

/// Which parameter a routed value writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteTarget {
    Bpm,
    Swing,
    SyncMeasure,
    TrackMute(usize),
    TrackPattern(usize),
}

/// A single source-to-target mapping with an output range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Route {
    pub source: RouteSource,
    pub target: RouteTarget,
    /// Target value at normalized source 0
    pub min: f32,
    /// Target value at normalized source 1
    pub max: f32,
}

/// Fixed-size table of optional routes.
#[derive(Clone, Debug, Default)]
pub struct RoutingTable {
    routes: [Option<Route>; ROUTE_COUNT],
}

impl RoutingTable {
    pub fn route(&self, index: usize) -> Option<&Route> {
        self.routes.get(index).and_then(|r| r.as_ref())
    }

    pub fn set_route(&mut self, index: usize, route: Route) {
        if index < ROUTE_COUNT {
            self.routes[index] = Some(route);
        }
    }

    pub fn clear_route(&mut self, index: usize) {
        if index < ROUTE_COUNT {
            self.routes[index] = None;
        }
    }

    /// Iterate configured routes with their table indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Route)> {
        self.routes
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|r| (i, r)))
    }
}
