/// Test fixtures: representative payloads from the bike-share provider.
///
/// Realtime status shape:
///   realtimeList[]
///     .stationId          — "<prefix>-<digits>", e.g. "ST-101"
///     .stationName        — display name, the join key against stations
///     .stationLongitude / .stationLatitude — decimal degrees as STRINGS
///     .rackTotCnt         — dock capacity as a STRING
///     .stationUseYn       — "Y" when in service
///     .parkingBikeTotCnt  — bikes currently docked, as a STRING
///
/// Station listing page shape: one `<tr>` per station, name in the second
/// cell inside `<a>`, address in the sixth cell inside `<span>`.

/// Two stations, both in service except the second.
#[cfg(test)]
pub(crate) fn fixture_realtime_status_json() -> &'static str {
    r#"{
      "realtimeList": [
        {
          "stationId": "ST-101",
          "stationName": "101. Mangwon Station Exit 1",
          "stationLongitude": "126.91062927",
          "stationLatitude": "37.55564880",
          "rackTotCnt": "22",
          "stationUseYn": "Y",
          "parkingBikeTotCnt": "9",
          "shared": "41",
          "stationImgFileName": ""
        },
        {
          "stationId": "ST-102",
          "stationName": "102. Mangwon Station Exit 2",
          "stationLongitude": "126.91083527",
          "stationLatitude": "37.55490494",
          "rackTotCnt": "16",
          "stationUseYn": "N",
          "parkingBikeTotCnt": "0",
          "shared": "0",
          "stationImgFileName": ""
        }
      ]
    }"#
}

/// A realtime entry whose id has no prefix separator.
#[cfg(test)]
pub(crate) fn fixture_unprefixed_id_json() -> &'static str {
    r#"{
      "realtimeList": [
        {
          "stationId": "123",
          "stationName": "Gangnam",
          "stationLongitude": "127.0",
          "stationLatitude": "37.5",
          "rackTotCnt": "20",
          "stationUseYn": "Y"
        }
      ]
    }"#
}

/// First page of the station listing: header row plus two stations.
#[cfg(test)]
pub(crate) fn fixture_address_page_html() -> &'static str {
    r##"<html>
      <body>
        <table class="psbox">
          <thead>
            <tr><th>No</th><th>Station</th><th>Racks</th><th>LCD</th><th>QR</th><th>Address</th></tr>
          </thead>
          <tbody>
            <tr>
              <td>1</td>
              <td><a href="#" onclick="moveStationDetail('ST-101')">101. Mangwon Station Exit 1</a></td>
              <td>22</td><td>Y</td><td>N</td>
              <td><span>  Seoul Mapo-gu   Manwon-dong 472-1 </span></td>
            </tr>
            <tr>
              <td>2</td>
              <td><a href="#" onclick="moveStationDetail('ST-102')">102. Mangwon Station Exit 2</a></td>
              <td>16</td><td>Y</td><td>N</td>
              <td><span>Seoul Mapo-gu Manwon-dong 481-6</span></td>
            </tr>
          </tbody>
        </table>
      </body>
    </html>"##
}

/// Page past the end of the listing: the table is rendered without rows.
#[cfg(test)]
pub(crate) fn fixture_empty_address_page_html() -> &'static str {
    r#"<html>
      <body>
        <table class="psbox">
          <thead>
            <tr><th>No</th><th>Station</th><th>Racks</th><th>LCD</th><th>QR</th><th>Address</th></tr>
          </thead>
          <tbody>
            <tr><td colspan="6">No stations found.</td></tr>
          </tbody>
        </table>
      </body>
    </html>"#
}

/// Station row whose name cell lost its link after a markup change.
#[cfg(test)]
pub(crate) fn fixture_malformed_address_page_html() -> &'static str {
    r#"<table>
      <tr>
        <td>1</td><td>101. Mangwon Station Exit 1</td><td>22</td><td>Y</td><td>N</td>
        <td><span>Seoul Mapo-gu Manwon-dong 472-1</span></td>
      </tr>
    </table>"#
}
