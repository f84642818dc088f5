use std::fmt::{self, Display, Formatter};

use crate::hw::InspectReport;
use crate::protocol::{self, EndpointId};

use super::device_view::DeviceView;
use super::painter::Painter;
use super::table::Table;

/// Renders a full inspect report with device, endpoint, and service tables.
pub(crate) struct InspectReportView<'a> {
    report: &'a InspectReport,
    painter: &'a Painter,
}

impl<'a> InspectReportView<'a> {
    pub(crate) fn new(report: &'a InspectReport, painter: &'a Painter) -> Self {
        Self { report, painter }
    }

    fn session_table(&self) -> Table {
        let metadata = self.report.session_metadata();
        let resolved = |endpoint: EndpointId| match metadata.resolved_endpoint_uuid(endpoint) {
            Some(uuid) => self.painter.value(uuid),
            None => self.painter.warning("<unresolved>"),
        };

        Table::key_value(
            self.painter,
            vec![
                (
                    "write_mode",
                    self.painter.value(metadata.write_mode().to_string()),
                ),
                ("write_uuid", resolved(EndpointId::WriteCharacteristic)),
                ("notify_uuid", resolved(EndpointId::NotifyCharacteristic)),
            ],
        )
    }

    fn endpoints_table(&self) -> Table {
        let endpoints = self.report.endpoint_presence();
        let rows = protocol::known_endpoints()
            .map(|endpoint| {
                let metadata = protocol::endpoint_metadata(endpoint);
                vec![
                    self.painter.value(metadata.uuid()),
                    self.painter.muted(metadata.kind().to_string()),
                    self.painter.value(metadata.name()),
                    if endpoints.is_present(endpoint) {
                        self.painter.success("present")
                    } else {
                        self.painter.warning("missing")
                    },
                ]
            })
            .collect();
        Table::grid(["uuid", "kind", "name", "status"], rows)
    }

    fn services_table(&self) -> Table {
        let mut rows = Vec::new();
        for service in self.report.services() {
            let primary = if service.is_primary() {
                self.painter.success("yes")
            } else {
                self.painter.muted("no")
            };

            if service.characteristics().is_empty() {
                rows.push(vec![
                    self.painter.value(service.uuid()),
                    primary,
                    self.painter.warning("<none>"),
                    self.painter.warning("<none>"),
                ]);
                continue;
            }

            for characteristic in service.characteristics() {
                rows.push(vec![
                    self.painter.value(service.uuid()),
                    primary.clone(),
                    self.painter.value(characteristic.uuid()),
                    self.painter.value(characteristic.properties().join(",")),
                ]);
            }
        }
        Table::grid(
            [
                "service_uuid",
                "primary",
                "characteristic_uuid",
                "properties",
            ],
            rows,
        )
    }
}

impl Display for InspectReportView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let device = DeviceView::new(self.report.device(), self.painter);

        write!(f, "{}", self.painter.heading("Connected device:"))?;
        write!(f, "\n{device}")?;
        writeln!(f)?;
        write!(f, "\n{}", self.painter.heading("Session metadata:"))?;
        write!(f, "\n{}", self.session_table())?;
        writeln!(f)?;
        write!(
            f,
            "\n{}",
            self.painter.heading("Expected password manager endpoints:")
        )?;
        write!(f, "\n{}", self.endpoints_table())?;
        writeln!(f)?;
        write!(f, "\n{}", self.painter.heading("Discovered GATT services:"))?;
        write!(f, "\n{}", self.services_table())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::hw::{
        CharacteristicInfo, EndpointPresence, FoundDevice, ServiceInfo, SessionMetadata,
        WriteMode,
    };

    use super::*;

    fn device() -> FoundDevice {
        FoundDevice::new(
            "hci0".into(),
            "AA:BB:CC".into(),
            Some("Hardware_Password_Manager".into()),
            Some(-43),
        )
    }

    #[test]
    fn inspect_report_renders_all_sections() {
        let services = vec![ServiceInfo::new(
            "6e400001-b5a3-f393-e0a9-e50e24dcca9e".into(),
            true,
            vec![
                CharacteristicInfo::new(
                    "6e400002-b5a3-f393-e0a9-e50e24dcca9e".into(),
                    vec!["write".into(), "write_without_response".into()],
                ),
                CharacteristicInfo::new(
                    "6e400003-b5a3-f393-e0a9-e50e24dcca9e".into(),
                    vec!["notify".into()],
                ),
            ],
        )];
        let mut presence = protocol::empty_presence_map();
        for endpoint in protocol::known_endpoints() {
            presence.insert(endpoint, true);
        }
        let endpoint_uuids = protocol::known_endpoints()
            .map(|endpoint| {
                (
                    endpoint,
                    protocol::endpoint_metadata(endpoint).uuid().to_string(),
                )
            })
            .collect();
        let report = InspectReport::new(
            device(),
            services,
            EndpointPresence::new(presence),
            SessionMetadata::new(endpoint_uuids, WriteMode::WithResponse),
        );
        let painter = Painter::new(false);

        let rendered = InspectReportView::new(&report, &painter).to_string();

        for heading in [
            "Connected device:",
            "Session metadata:",
            "Expected password manager endpoints:",
            "Discovered GATT services:",
        ] {
            assert!(rendered.contains(heading), "missing {heading}");
        }
        assert!(rendered.contains("with_response"));
        assert!(rendered.contains("write,write_without_response"));
        assert!(!rendered.contains("missing"));
        assert!(!rendered.contains("<unresolved>"));
    }

    #[test]
    fn service_without_characteristics_marks_endpoints_missing() {
        let services = vec![ServiceInfo::new(
            "00001800-0000-1000-8000-00805f9b34fb".into(),
            false,
            vec![],
        )];
        let report = InspectReport::new(
            device(),
            services,
            EndpointPresence::new(protocol::empty_presence_map()),
            SessionMetadata::new(BTreeMap::new(), WriteMode::WithoutResponse),
        );
        let painter = Painter::new(false);

        let rendered = InspectReportView::new(&report, &painter).to_string();

        assert_eq!(3, rendered.matches("missing").count());
        assert_eq!(2, rendered.matches("<unresolved>").count());
        assert!(rendered.contains("<none>"));
    }
}
