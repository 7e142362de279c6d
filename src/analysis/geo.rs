// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Geodesic distance between GPS fixes

/// Mean earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_372_797.560856;

/// Great-circle distance in meters, combined with the altitude change.
///
/// The horizontal component uses the haversine formula; the vertical
/// delta is folded in as the other leg of a right triangle.
pub fn haversine_distance(
    lat1: f64,
    lon1: f64,
    alt1: f64,
    lat2: f64,
    lon2: f64,
    alt2: f64,
) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    let horizontal = EARTH_RADIUS_M * c;

    let vertical = alt2 - alt1;
    (horizontal * horizontal + vertical * vertical).sqrt()
}
