//! Exporter - live owned containers back into the document schema
//!
//! Only containers round-trip. Networks and packages are not captured.
//! Output is sorted by name so two exports of unchanged state are
//! byte-identical whatever order the runtime lists containers in.

use crate::types::{ContainerSpec, DesiredDocument, ObservedContainer};

/// Map owned containers to desired-state entries, sorted by name
pub fn export_containers(observed: &[ObservedContainer]) -> Vec<ContainerSpec> {
    let mut specs: Vec<ContainerSpec> = observed
        .iter()
        .filter(|c| c.owner.is_managed())
        .map(|c| ContainerSpec::new(&c.name, &c.image))
        .collect();
    specs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.image.cmp(&b.image)));
    specs
}

pub fn export_document(observed: &[ObservedContainer]) -> DesiredDocument {
    DesiredDocument {
        containers: export_containers(observed),
        networks: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{foreign_container, managed_container};

    #[test]
    fn test_single_managed_container() {
        let observed = vec![
            managed_container("web", "nginx:latest", true),
            foreign_container("portainer", "portainer/portainer-ce", None),
        ];

        let doc = export_document(&observed);
        assert_eq!(doc.containers, vec![ContainerSpec::new("web", "nginx:latest")]);
        assert_eq!(
            doc.to_yaml().unwrap(),
            "containers:\n- name: web\n  image: nginx:latest\n"
        );
    }

    #[test]
    fn test_no_managed_containers_is_empty_list() {
        let observed = vec![foreign_container("x", "alpine", Some("compose"))];
        let doc = export_document(&observed);
        assert!(doc.containers.is_empty());
        assert_eq!(doc.to_yaml().unwrap().trim(), "containers: []");
    }

    #[test]
    fn test_sorted_regardless_of_listing_order() {
        let a = vec![
            managed_container("zeta", "img:z", true),
            managed_container("alpha", "img:a", false),
        ];
        let mut b = a.clone();
        b.reverse();

        assert_eq!(
            export_document(&a).to_yaml().unwrap(),
            export_document(&b).to_yaml().unwrap()
        );
        assert_eq!(export_containers(&a)[0].name, "alpha");
    }
}
