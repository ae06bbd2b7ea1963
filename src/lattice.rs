//! Hierarchical beamline description and its flattening into a walkable element sequence

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::error::ModelError;

/// Entry of a [Sequence]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    /// Leaf element
    Element(Element),
    /// Nested sequence
    Sequence(Sequence),
}

/// Ordered, possibly nested, collection of elements.
///
/// Deserialization is strict: a sequence object holds exactly `id` and `nodes`, so a malformed
/// element cannot be mistaken for an empty sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sequence {
    /// Sequence identifier
    pub id: String,
    /// Child sequences and elements, in beam order
    pub nodes: Vec<Node>,
}

impl Sequence {
    /// Empty sequence
    pub fn new(id: impl Into<String>) -> Sequence {
        Sequence {
            id: id.into(),
            nodes: Vec::new(),
        }
    }

    /// Append an element
    pub fn push(&mut self, element: impl Into<Element>) {
        self.nodes.push(Node::Element(element.into()));
    }

    /// Append a nested sequence
    pub fn push_sequence(&mut self, sequence: Sequence) {
        self.nodes.push(Node::Sequence(sequence));
    }

    /// Builder-style [Sequence::push]
    pub fn with(mut self, element: impl Into<Element>) -> Sequence {
        self.push(element);
        self
    }

    /// Append all nodes of `other` after the nodes of `self`
    pub fn concatenate(&mut self, other: Sequence) {
        self.nodes.extend(other.nodes);
    }

    /// Depth-first iterator over all leaf elements in beam order
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves {
            stack: vec![self.nodes.iter()],
        }
    }

    /// Number of leaf elements
    pub fn leaf_count(&self) -> usize {
        self.leaves().count()
    }

    /// Total length \[m\]
    pub fn length(&self) -> f64 {
        self.leaves().map(Element::length).sum()
    }

    /// First leaf with the given id
    pub fn find(&self, id: &str) -> Option<&Element> {
        self.leaves().find(|elem| elem.id() == id)
    }

    /// Position of the entrance of the first leaf with the given id \[m\]
    pub fn position_of(&self, id: &str) -> Option<f64> {
        let mut position = 0.0;
        for elem in self.leaves() {
            if elem.id() == id {
                return Some(position);
            }
            position += elem.length();
        }
        None
    }

    /// Check all leaf elements
    pub fn validate(&self) -> Result<(), ModelError> {
        self.leaves().try_for_each(Element::validate)
    }
}

/// Iterator returned by [Sequence::leaves]
pub struct Leaves<'a> {
    stack: Vec<std::slice::Iter<'a, Node>>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<&'a Element> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(Node::Element(elem)) => return Some(elem),
                Some(Node::Sequence(seq)) => self.stack.push(seq.nodes.iter()),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Sequence;
    use crate::element::{Drift, Marker, Quadrupole};

    fn cell(id: &str) -> Sequence {
        Sequence::new(id)
            .with(Quadrupole::new(format!("{id}:QF"), 0.1, 10.0))
            .with(Drift::new(format!("{id}:DR"), 0.4))
            .with(Quadrupole::new(format!("{id}:QD"), 0.1, -10.0))
    }

    #[test]
    fn flattening_preserves_order() {
        let mut line = Sequence::new("LINE");
        line.push(Marker { id: "BEGIN".into() });
        line.push_sequence(cell("C1"));
        let mut nested = Sequence::new("OUTER");
        nested.push_sequence(cell("C2"));
        nested.push_sequence(Sequence::new("EMPTY"));
        line.push_sequence(nested);
        line.push(Drift::new("END", 1.0));

        let ids: Vec<_> = line.leaves().map(|e| e.id().to_owned()).collect();
        assert_eq!(
            ids,
            ["BEGIN", "C1:QF", "C1:DR", "C1:QD", "C2:QF", "C2:DR", "C2:QD", "END"]
        );
        assert_eq!(line.leaf_count(), 8);
        assert!((line.length() - 2.2).abs() < 1e-12);
        assert!((line.position_of("C2:DR").unwrap() - 0.7).abs() < 1e-12);
        assert_eq!(line.position_of("MISSING"), None);
        assert_eq!(line.find("C1:QD").map(|e| e.type_tag()), Some("Quadrupole"));
    }

    #[test]
    fn concatenate() {
        let mut line = cell("C1");
        line.concatenate(cell("C2"));

        assert_eq!(line.leaf_count(), 6);
        assert!((line.length() - 1.2).abs() < 1e-12);
        assert_eq!(Sequence::new("EMPTY").leaf_count(), 0);
    }

    #[test]
    fn deserialize_nested() {
        let json = r#"{
            "id": "LINE",
            "nodes": [
                {"type": "Drift", "id": "DR1", "length": 0.5},
                {"id": "CELL", "nodes": [{"type": "Marker", "id": "M1"}]}
            ]
        }"#;
        let line: Sequence = serde_json::from_str(json).unwrap();

        assert_eq!(line.leaf_count(), 2);
        assert_eq!(line.find("M1").map(|e| e.length()), Some(0.0));
    }

    #[test]
    fn malformed_element_is_rejected() {
        let misspelled = r#"{
            "id": "LINE",
            "nodes": [
                {"type": "Drift", "id": "DR1", "length": 0.5},
                {"type": "Drift", "id": "DR2", "lenght": 0.5}
            ]
        }"#;
        assert!(serde_json::from_str::<Sequence>(misspelled).is_err());

        let missing_angle = r#"{
            "id": "LINE",
            "nodes": [{"type": "SectorBend", "id": "B1", "length": 1.0, "field": 0.3}]
        }"#;
        assert!(serde_json::from_str::<Sequence>(missing_angle).is_err());

        let no_nodes = r#"{"id": "LINE", "nodes": [{"id": "CELL"}]}"#;
        assert!(serde_json::from_str::<Sequence>(no_nodes).is_err());
    }
}
