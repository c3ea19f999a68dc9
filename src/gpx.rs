use crate::error::{Error, Result};
use crate::sport::Sport;
use crate::types::TrackPoint;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

pub const GPX_NS: &str = "http://www.topografix.com/GPX/1/1";
pub const TRACKPOINT_EXT_NS: &str = "http://www.garmin.com/xmlschemas/TrackPointExtension/v1";
const CREATOR: &str = concat!("endoclient ", env!("CARGO_PKG_VERSION"));

/// Renders one track with one segment. Points keep their input order.
pub fn render(sport: Sport, points: &[TrackPoint]) -> Result<String> {
    let mut xml = Writer::new_with_indent(Vec::new(), b' ', 2);

    emit(&mut xml, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("gpx");
    root.push_attribute(("version", "1.1"));
    root.push_attribute(("creator", CREATOR));
    root.push_attribute(("xmlns", GPX_NS));
    root.push_attribute(("xmlns:gpxtpx", TRACKPOINT_EXT_NS));
    emit(&mut xml, Event::Start(root))?;
    emit(&mut xml, Event::Start(BytesStart::new("trk")))?;
    text_element(&mut xml, "type", &sport.gpx_type())?;
    emit(&mut xml, Event::Start(BytesStart::new("trkseg")))?;

    for p in points {
        write_trkpt(&mut xml, p)?;
    }

    emit(&mut xml, Event::End(BytesEnd::new("trkseg")))?;
    emit(&mut xml, Event::End(BytesEnd::new("trk")))?;
    emit(&mut xml, Event::End(BytesEnd::new("gpx")))?;

    let mut out = String::from_utf8(xml.into_inner()).map_err(|e| Error::Gpx(e.to_string()))?;
    out.push('\n');
    Ok(out)
}

fn write_trkpt(xml: &mut Writer<Vec<u8>>, p: &TrackPoint) -> Result<()> {
    let mut trkpt = BytesStart::new("trkpt");
    trkpt.push_attribute(("lat", p.lat.to_string().as_str()));
    trkpt.push_attribute(("lon", p.lon.to_string().as_str()));
    emit(xml, Event::Start(trkpt))?;

    // GPX 1.1 wptType order: ele, time, ..., extensions
    if let Some(alt) = p.alt {
        text_element(xml, "ele", &alt.to_string())?;
    }
    text_element(xml, "time", &p.time.format("%Y-%m-%dT%H:%M:%SZ").to_string())?;

    if let Some(hr) = p.hr {
        emit(xml, Event::Start(BytesStart::new("extensions")))?;
        emit(xml, Event::Start(BytesStart::new("gpxtpx:TrackPointExtension")))?;
        text_element(xml, "gpxtpx:hr", &hr.to_string())?;
        emit(xml, Event::End(BytesEnd::new("gpxtpx:TrackPointExtension")))?;
        emit(xml, Event::End(BytesEnd::new("extensions")))?;
    }

    emit(xml, Event::End(BytesEnd::new("trkpt")))
}

fn text_element(xml: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    emit(xml, Event::Start(BytesStart::new(name)))?;
    emit(xml, Event::Text(BytesText::new(text)))?;
    emit(xml, Event::End(BytesEnd::new(name)))
}

fn emit(xml: &mut Writer<Vec<u8>>, ev: Event<'_>) -> Result<()> {
    xml.write_event(ev).map_err(|e| Error::Gpx(e.to_string()))
}
